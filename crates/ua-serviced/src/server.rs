//! `ServerCore` and the single-threaded cooperative event-dispatcher loop
//! (§5 "Concurrency & resource model").
//!
//! Grounded on `gossipd::server::Server`: one long-lived struct owning every
//! subsystem behind `Arc`-free shared state (the teacher uses
//! `parking_lot::RwLock` fields directly rather than message-passing to its
//! own state, which this core follows for everything except the event
//! queue itself), a `tokio::sync::broadcast` shutdown signal, and
//! `spawn_sync_task`/`spawn_prune_task`'s "interval + `tokio::select!` against
//! shutdown, `.abort()` on teardown" pattern — generalised here from two
//! fixed background timers to one `tokio::time::interval` per subscription.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};

use ua_core::{Identifier, NodeId, StatusCode};
use ua_proto::{RequestBody, ResponseBody};

use crate::address_space::{AddressSpace, AddressSpaceError};
use crate::config::ServerConfig;
use crate::event::{CoreEvent, PriorityEvent, RequestEnvelope};
use crate::handlers::browse::ContinuationPointStore;
use crate::handlers::call::MethodCallManager;
use crate::handlers::get_endpoints::EndpointConfig;
use crate::handlers::write::{AllowAll, WriteAuthorizer};
use crate::handlers::{
    handle_browse, handle_browse_next, handle_call, handle_get_endpoints, handle_read, handle_write,
};
use crate::session::{AllowAnonymous, Authenticator, SessionManager};
use crate::subscriptions::SubscriptionEngine;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("address space error: {0}")]
    AddressSpace(#[from] AddressSpaceError),
    #[error("failed to read address-space fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse address-space fixture: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every subsystem the dispatcher loop owns, gathered behind one struct so
/// a single `tokio::task` can hold it without `Arc` (§5: "the address space
/// is mutated only from the service thread").
pub struct ServerCore {
    address_space: AddressSpace,
    endpoint_config: EndpointConfig,
    sessions: SessionManager,
    subscriptions: SubscriptionEngine,
    continuation_points: ContinuationPointStore,
    methods: MethodCallManager,
    write_authorizer: Box<dyn WriteAuthorizer + Send + Sync>,
    authenticator: Box<dyn Authenticator + Send + Sync>,
    /// `subscription_id -> session_key` (§4.G ties a subscription's timer
    /// back to the session whose Publish-request queue it drains).
    subscription_owner: Mutex<HashMap<u32, u32>>,
    /// Reply channels for Publish requests, parallel to the subscription
    /// engine's own per-session request queue (kept here because the wire
    /// reply channel is a dispatcher concern, not a subscription-engine
    /// one).
    publish_replies: Mutex<HashMap<u32, VecDeque<oneshot::Sender<ResponseBody>>>>,
    subscription_timers: Mutex<HashMap<u32, tokio::task::JoinHandle<()>>>,
    priority_tx: mpsc::UnboundedSender<PriorityEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

fn session_key(authentication_token: &NodeId) -> u32 {
    match authentication_token.identifier {
        Identifier::Numeric(n) => n,
        _ => 0,
    }
}

impl ServerCore {
    pub fn new(config: &ServerConfig, priority_tx: mpsc::UnboundedSender<PriorityEvent>) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(&config.address_space)?;
        let nodes: Vec<ua_core::Node> = serde_json::from_str(&raw)?;
        let address_space = AddressSpace::new();
        address_space.configure(nodes)?;

        let endpoint_config = EndpointConfig {
            endpoint_url: config.endpoint_url.clone(),
            application_uri: config.application_uri.clone(),
            product_uri: config.product_uri.clone(),
            application_name: ua_core::LocalizedText::new("en", &config.application_uri),
            discovery_urls: Vec::new(),
            security_policies: vec![(
                crate::handlers::get_endpoints::SecurityPolicy::None,
                crate::handlers::get_endpoints::ModeMask::ALL,
            )],
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(ServerCore {
            address_space,
            endpoint_config,
            sessions: SessionManager::new(config.max_sessions),
            subscriptions: SubscriptionEngine::new(),
            continuation_points: ContinuationPointStore::new(),
            methods: MethodCallManager::new(),
            write_authorizer: Box::new(AllowAll),
            authenticator: Box::new(AllowAnonymous),
            subscription_owner: Mutex::new(HashMap::new()),
            publish_replies: Mutex::new(HashMap::new()),
            subscription_timers: Mutex::new(HashMap::new()),
            priority_tx,
            shutdown_tx,
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn session_count(&self) -> usize {
        self.sessions.session_count()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    /// Session keys with a live Publish-request queue, used by the sweep
    /// timer to know which sessions to check for expired requests.
    fn known_session_keys(&self) -> Vec<u32> {
        self.publish_replies.lock().keys().copied().collect()
    }

    /// Dispatch one decoded request to its service handler and return the
    /// response body (§4.F). `Publish` is the one service whose response
    /// does not come back synchronously; the caller is responsible for
    /// awaiting it on `reply` instead of using the return value.
    #[instrument(skip(self, body), fields(kind = ?body.kind()))]
    fn dispatch(&self, body: RequestBody, reply: oneshot::Sender<ResponseBody>) {
        let response = match body {
            RequestBody::Read(request) => ResponseBody::Read(handle_read(&self.address_space, &request)),
            RequestBody::Write(request) => {
                let (response, events) = handle_write(&self.address_space, self.write_authorizer.as_ref(), &request);
                for event in events {
                    self.subscriptions.notify_data_change(&event.node_id, event.attribute_id, &event.new_value);
                }
                ResponseBody::Write(response)
            }
            RequestBody::Browse(request) => {
                ResponseBody::Browse(handle_browse(&self.address_space, &self.continuation_points, &request))
            }
            RequestBody::BrowseNext(request) => {
                ResponseBody::BrowseNext(handle_browse_next(&self.continuation_points, &request))
            }
            RequestBody::CreateSubscription(request) => {
                let response = self.subscriptions.create_subscription(&request);
                self.sessions.attach_subscription(&request.header.authentication_token, response.subscription_id);
                let key = session_key(&request.header.authentication_token);
                self.subscription_owner.lock().insert(response.subscription_id, key);
                self.publish_replies.lock().entry(key).or_default();
                self.spawn_subscription_timer(response.subscription_id, response.revised_publishing_interval);
                ResponseBody::CreateSubscription(response)
            }
            RequestBody::ModifySubscription(request) => {
                let response = self.subscriptions.modify_subscription(&request);
                if response.header.service_result == StatusCode::Ok {
                    self.spawn_subscription_timer(request.subscription_id, response.revised_publishing_interval);
                }
                ResponseBody::ModifySubscription(response)
            }
            RequestBody::CreateMonitoredItems(request) => {
                ResponseBody::CreateMonitoredItems(self.subscriptions.create_monitored_items(&request))
            }
            RequestBody::Publish(request) => {
                let key = session_key(&request.header.authentication_token);
                self.publish_replies.lock().entry(key).or_default().push_back(reply);
                self.subscriptions.enqueue_publish(key, request);
                return;
            }
            RequestBody::SetPublishingMode(request) => {
                ResponseBody::SetPublishingMode(self.subscriptions.set_publishing_mode(&request))
            }
            RequestBody::Call(request) => ResponseBody::Call(handle_call(&self.methods, &request)),
            RequestBody::GetEndpoints(request) => ResponseBody::GetEndpoints(handle_get_endpoints(
                &self.endpoint_config,
                crate::handlers::get_endpoints::EndpointsContext::GetEndpoints,
                &request,
            )),
            RequestBody::CreateSession(request) => {
                ResponseBody::CreateSession(self.sessions.create_session(&self.endpoint_config, &request))
            }
            RequestBody::ActivateSession(request) => {
                ResponseBody::ActivateSession(self.sessions.activate_session(self.authenticator.as_ref(), &request))
            }
            RequestBody::CloseSession(request) => {
                let (response, owned_subscriptions) = self.sessions.close_session(&request);
                if !owned_subscriptions.is_empty() {
                    self.subscriptions.delete_session_subscriptions(&owned_subscriptions);
                    let mut timers = self.subscription_timers.lock();
                    for id in &owned_subscriptions {
                        self.subscription_owner.lock().remove(id);
                        if let Some(handle) = timers.remove(id) {
                            handle.abort();
                        }
                    }
                }
                ResponseBody::CloseSession(response)
            }
            RequestBody::Republish(request) => {
                let now = chrono::Utc::now();
                match self.subscriptions.republish(request.subscription_id, request.retransmit_sequence_number) {
                    Ok(notification_message) => ResponseBody::Republish(ua_proto::RepublishResponse {
                        header: ua_proto::ResponseHeader::ok(&request.header, now),
                        notification_message,
                    }),
                    Err(err) => ResponseBody::Republish(ua_proto::RepublishResponse {
                        header: ua_proto::ResponseHeader::fault(&request.header, now, (&err).into()),
                        notification_message: ua_proto::NotificationMessage {
                            sequence_number: 0,
                            publish_time: now,
                            data_change_notifications: Vec::new(),
                        },
                    }),
                }
            }
        };
        let _ = reply.send(response);
    }

    /// Spawn (or replace) the `tokio::time::interval` driving one
    /// subscription's publish cycle, aborting any prior timer for the same
    /// id first (§4.G "Modify ... replace the timer's period").
    fn spawn_subscription_timer(&self, subscription_id: u32, revised_publishing_interval_ms: f64) {
        let mut timers = self.subscription_timers.lock();
        if let Some(previous) = timers.remove(&subscription_id) {
            previous.abort();
        }
        let period = Duration::from_millis(revised_publishing_interval_ms.max(1.0) as u64);
        let tx = self.priority_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(PriorityEvent::PublishCycleTimeout { subscription_id }).is_err() {
                    break;
                }
            }
        });
        timers.insert(subscription_id, handle);
    }

    /// React to one subscription's publish-interval tick (§4.G "Publish
    /// cycle"): ship a notification or keep-alive if a Publish request is
    /// waiting, otherwise tick the lifetime counter. If the tick trips the
    /// lifetime counter, `on_publish_timeout` completes any queued Publish
    /// request with `BadNoSubscription` before removing the subscription;
    /// this branch delivers that reply the same way as a normal one. Tears
    /// down the timer once the subscription expires.
    fn on_publish_cycle_timeout(&self, subscription_id: u32) {
        let Some(&key) = self.subscription_owner.lock().get(&subscription_id) else { return };
        if let Some(response) = self.subscriptions.on_publish_timeout(subscription_id, key, chrono::Utc::now()) {
            if let Some(reply) = self.publish_replies.lock().get_mut(&key).and_then(|q| q.pop_front()) {
                let _ = reply.send(ResponseBody::Publish(response));
            }
        }
        if !self.subscriptions.contains(subscription_id) {
            self.subscription_owner.lock().remove(&subscription_id);
            if let Some(handle) = self.subscription_timers.lock().remove(&subscription_id) {
                handle.abort();
            }
        }
    }

    /// Sweep one session's pending Publish requests for deadline expiry
    /// (§4.G "Publish-request expiration"), replying `BadTimeout` to each.
    fn sweep_expired_publishes(&self, session_key: u32) {
        let expired = self.subscriptions.expire_publishes(session_key, chrono::Utc::now());
        if expired.is_empty() {
            return;
        }
        warn!(session_key, count = expired.len(), "timing out expired publish requests");
        let mut replies = self.publish_replies.lock();
        let Some(queue) = replies.get_mut(&session_key) else { return };
        for response in expired {
            if let Some(reply) = queue.pop_front() {
                let _ = reply.send(ResponseBody::Publish(response));
            }
        }
    }
}

/// How often the sweep timer checks every session's Publish-request queue
/// for requests past their `timeout_hint` deadline (§4.G "Publish-request
/// expiration").
const PUBLISH_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Owns the event-dispatcher task: drains the priority queue first each
/// iteration, then the normal queue, exactly mirroring `gossipd::server`'s
/// `tokio::select!` loop (§5 "Ordering guarantees").
pub struct Server {
    core: Arc<ServerCore>,
    normal_tx: mpsc::UnboundedSender<CoreEvent>,
    normal_rx: Mutex<Option<mpsc::UnboundedReceiver<CoreEvent>>>,
    priority_rx: Mutex<Option<mpsc::UnboundedReceiver<PriorityEvent>>>,
}

impl Server {
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let (priority_tx, priority_rx) = mpsc::unbounded_channel();
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let core = Arc::new(ServerCore::new(config, priority_tx)?);
        Ok(Server { core, normal_tx, normal_rx: Mutex::new(Some(normal_rx)), priority_rx: Mutex::new(Some(priority_rx)) })
    }

    /// A sender for posting decoded requests onto the normal-priority
    /// queue; the wire/transport layer (external collaborator) holds this.
    pub fn request_sender(&self) -> mpsc::UnboundedSender<CoreEvent> {
        self.normal_tx.clone()
    }

    pub fn core(&self) -> Arc<ServerCore> {
        self.core.clone()
    }

    pub async fn run(&self) -> Result<(), ServerError> {
        let mut normal_rx = self.normal_rx.lock().take().expect("Server::run called twice");
        let mut priority_rx = self.priority_rx.lock().take().expect("Server::run called twice");
        let mut shutdown_rx = self.core.shutdown_tx.subscribe();

        info!("starting event dispatcher");

        let sweep_core = self.core.clone();
        let sweep_tx = self.core.priority_tx.clone();
        let sweep_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(PUBLISH_SWEEP_INTERVAL_MS));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for session_key in sweep_core.known_session_keys() {
                    if sweep_tx.send(PriorityEvent::SweepExpiredPublishes { session_key }).is_err() {
                        return;
                    }
                }
            }
        });

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("shutting down event dispatcher");
                    break;
                }
                Some(event) = priority_rx.recv() => {
                    match event {
                        PriorityEvent::PublishCycleTimeout { subscription_id } => {
                            self.core.on_publish_cycle_timeout(subscription_id);
                        }
                        PriorityEvent::SweepExpiredPublishes { session_key } => {
                            self.core.sweep_expired_publishes(session_key);
                        }
                    }
                }
                Some(event) = normal_rx.recv() => {
                    match event {
                        CoreEvent::Request(RequestEnvelope { body, reply }) => {
                            debug!(kind = ?body.kind(), "dispatching request");
                            self.core.dispatch(body, reply);
                        }
                    }
                }
                else => break,
            }
        }

        sweep_handle.abort();
        for (_, handle) in self.core.subscription_timers.lock().drain() {
            handle.abort();
        }

        Ok(())
    }

    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}
