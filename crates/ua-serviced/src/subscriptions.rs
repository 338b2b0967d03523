//! Subscription Engine (§4.G): monitored items, the publish cycle,
//! sequence numbers, and acknowledgements.
//!
//! Grounded on `sync.rs`'s `SyncManager` (`RwLock<HashMap<id, State>>` plus
//! a `stats()` snapshot and a `peers_needing_sync` sweep) generalised from
//! one peer-sync state machine to one publish-cycle state machine per
//! subscription, and on `membership.rs`'s `RateLimitState`-style counter
//! reset-on-threshold pattern for the keep-alive/lifetime counters.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use ua_core::{AttributeId, DataValue, NodeId, StatusCode};
use ua_proto::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, ModifySubscriptionRequest, ModifySubscriptionResponse,
    MonitoredItemCreateResult, MonitoredItemNotification, MonitoringMode, NotificationMessage,
    PublishRequest, PublishResponse, ResponseHeader, SetPublishingModeRequest,
    SetPublishingModeResponse,
};

use crate::decode::decode_create_monitored_items;

pub const MIN_PUBLISHING_INTERVAL_MS: f64 = 50.0;
pub const MAX_PUBLISHING_INTERVAL_MS: f64 = 60_000.0;
pub const MIN_KEEP_ALIVE_COUNT: u32 = 3;
pub const MAX_KEEP_ALIVE_COUNT: u32 = 10_000;
pub const MIN_LIFETIME_COUNT: u32 = 10;
pub const MAX_LIFETIME_COUNT: u32 = 100_000;
pub const MAX_OPERATIONS_PER_MESSAGE: u32 = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("unknown subscription id")]
    SubscriptionIdInvalid,
    #[error("no retained notification with that sequence number")]
    SequenceNumberUnknown,
}

impl From<&SubscriptionError> for StatusCode {
    fn from(err: &SubscriptionError) -> StatusCode {
        match err {
            SubscriptionError::SubscriptionIdInvalid => StatusCode::BadSubscriptionIdInvalid,
            SubscriptionError::SequenceNumberUnknown => StatusCode::BadSequenceNumberUnknown,
        }
    }
}

/// `next(prev) = if prev == u32::MAX { 1 } else { prev + 1 }` (§4.G
/// "Sequence-number generator"); sequence numbers never emit `0`.
pub fn next_sequence_number(prev: u32) -> u32 {
    if prev == u32::MAX {
        1
    } else {
        prev + 1
    }
}

/// The revision formula shared by `CreateSubscription` and
/// `ModifySubscription` (§4.G "Create"), applied as a strict total
/// ordering: interval, then keep-alive, then lifetime (which depends on
/// the revised keep-alive), then max-notifications last.
pub struct Revised {
    pub publishing_interval: f64,
    pub max_keep_alive_count: u32,
    pub lifetime_count: u32,
    pub max_notifications_per_publish: u32,
}

pub fn revise(
    requested_publishing_interval: f64,
    requested_lifetime_count: u32,
    requested_max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
) -> Revised {
    let publishing_interval = requested_publishing_interval.clamp(MIN_PUBLISHING_INTERVAL_MS, MAX_PUBLISHING_INTERVAL_MS);
    let max_keep_alive_count = requested_max_keep_alive_count.clamp(MIN_KEEP_ALIVE_COUNT, MAX_KEEP_ALIVE_COUNT);
    let lifetime_count =
        requested_lifetime_count.max(3 * max_keep_alive_count).clamp(MIN_LIFETIME_COUNT, MAX_LIFETIME_COUNT);
    let max_notifications_per_publish = if max_notifications_per_publish == 0 {
        0
    } else {
        max_notifications_per_publish.min(MAX_OPERATIONS_PER_MESSAGE)
    };
    Revised { publishing_interval, max_keep_alive_count, lifetime_count, max_notifications_per_publish }
}

pub struct MonitoredItem {
    pub id: u32,
    pub node_id: NodeId,
    pub attribute_id: AttributeId,
    pub index_range: String,
    pub monitoring_mode: MonitoringMode,
    pub client_handle: u32,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
    pending: VecDeque<DataValue>,
}

impl MonitoredItem {
    /// Queue a sample, dropping the oldest entry once `revised_queue_size`
    /// is reached (§4.G "Monitored items").
    fn enqueue(&mut self, value: DataValue) {
        if self.pending.len() as u32 >= self.revised_queue_size.max(1) {
            self.pending.pop_front();
        }
        self.pending.push_back(value);
    }

    fn drain(&mut self) -> Vec<MonitoredItemNotification> {
        self.pending
            .drain(..)
            .map(|value| MonitoredItemNotification { client_handle: self.client_handle, value })
            .collect()
    }
}

struct PendingPublish {
    request: PublishRequest,
    deadline: DateTime<Utc>,
}

pub struct Subscription {
    pub id: u32,
    pub publishing_enabled: bool,
    pub revised: Revised,
    keep_alive_counter: u32,
    lifetime_counter: u32,
    last_sequence_number: u32,
    retained: Vec<NotificationMessage>,
    monitored_items: HashMap<u32, MonitoredItem>,
}

impl Subscription {
    fn has_queued_notifications(&self) -> bool {
        self.monitored_items.values().any(|item| !item.pending.is_empty())
    }

    fn drain_notifications(&mut self, now: DateTime<Utc>) -> NotificationMessage {
        self.last_sequence_number = next_sequence_number(self.last_sequence_number);
        let mut data_change_notifications = Vec::new();
        for item in self.monitored_items.values_mut() {
            data_change_notifications.extend(item.drain());
            if self.revised.max_notifications_per_publish != 0
                && data_change_notifications.len() as u32 >= self.revised.max_notifications_per_publish
            {
                break;
            }
        }
        let message = NotificationMessage { sequence_number: self.last_sequence_number, publish_time: now, data_change_notifications };
        self.retained.push(message.clone());
        self.keep_alive_counter = 0;
        self.lifetime_counter = 0;
        message
    }

    fn keep_alive(&mut self, now: DateTime<Utc>) -> NotificationMessage {
        self.last_sequence_number = next_sequence_number(self.last_sequence_number);
        let message = NotificationMessage { sequence_number: self.last_sequence_number, publish_time: now, data_change_notifications: Vec::new() };
        self.keep_alive_counter = 0;
        message
    }
}

/// The subscription engine owns every subscription's state and the
/// `node_id -> monitored items` fan-out index used by the Write handler's
/// data-change events (§4.G "Write -> data-change fan-out").
pub struct SubscriptionEngine {
    subscriptions: RwLock<HashMap<u32, Subscription>>,
    pending_publishes: RwLock<HashMap<u32, VecDeque<PendingPublish>>>,
    node_index: RwLock<HashMap<NodeId, Vec<(u32, u32)>>>,
    next_subscription_id: AtomicU32,
    next_monitored_item_id: AtomicU32,
}

impl SubscriptionEngine {
    pub fn new() -> Self {
        SubscriptionEngine {
            subscriptions: RwLock::new(HashMap::new()),
            pending_publishes: RwLock::new(HashMap::new()),
            node_index: RwLock::new(HashMap::new()),
            next_subscription_id: AtomicU32::new(1),
            next_monitored_item_id: AtomicU32::new(1),
        }
    }

    pub fn create_subscription(&self, request: &CreateSubscriptionRequest) -> CreateSubscriptionResponse {
        let now = Utc::now();
        let revised = revise(
            request.requested_publishing_interval,
            request.requested_lifetime_count,
            request.requested_max_keep_alive_count,
            request.max_notifications_per_publish,
        );
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let response = CreateSubscriptionResponse {
            header: ResponseHeader::ok(&request.header, now),
            subscription_id: id,
            revised_publishing_interval: revised.publishing_interval,
            revised_lifetime_count: revised.lifetime_count,
            revised_max_keep_alive_count: revised.max_keep_alive_count,
        };
        let subscription = Subscription {
            id,
            publishing_enabled: request.publishing_enabled,
            revised,
            keep_alive_counter: 0,
            lifetime_counter: 0,
            last_sequence_number: 0,
            retained: Vec::new(),
            monitored_items: HashMap::new(),
        };
        self.subscriptions.write().insert(id, subscription);
        self.pending_publishes.write().insert(id, VecDeque::new());
        response
    }

    pub fn modify_subscription(&self, request: &ModifySubscriptionRequest) -> ModifySubscriptionResponse {
        let now = Utc::now();
        let mut subscriptions = self.subscriptions.write();
        let Some(subscription) = subscriptions.get_mut(&request.subscription_id) else {
            return ModifySubscriptionResponse {
                header: ResponseHeader::fault(&request.header, now, StatusCode::BadSubscriptionIdInvalid),
                revised_publishing_interval: 0.0,
                revised_lifetime_count: 0,
                revised_max_keep_alive_count: 0,
            };
        };
        let revised = revise(
            request.requested_publishing_interval,
            request.requested_lifetime_count,
            request.requested_max_keep_alive_count,
            request.max_notifications_per_publish,
        );
        subscription.revised = revised;
        ModifySubscriptionResponse {
            header: ResponseHeader::ok(&request.header, now),
            revised_publishing_interval: subscription.revised.publishing_interval,
            revised_lifetime_count: subscription.revised.lifetime_count,
            revised_max_keep_alive_count: subscription.revised.max_keep_alive_count,
        }
    }

    pub fn set_publishing_mode(&self, request: &SetPublishingModeRequest) -> SetPublishingModeResponse {
        let now = Utc::now();
        let mut subscriptions = self.subscriptions.write();
        let results = request
            .subscription_ids
            .iter()
            .map(|id| match subscriptions.get_mut(id) {
                Some(subscription) => {
                    subscription.publishing_enabled = request.publishing_enabled;
                    StatusCode::Ok
                }
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect();
        SetPublishingModeResponse { header: ResponseHeader::ok(&request.header, now), results }
    }

    pub fn create_monitored_items(&self, request: &CreateMonitoredItemsRequest) -> CreateMonitoredItemsResponse {
        let now = Utc::now();
        let decoded = match decode_create_monitored_items(request, MAX_OPERATIONS_PER_MESSAGE) {
            Ok(decoded) => decoded,
            Err(err) => {
                return CreateMonitoredItemsResponse {
                    header: ResponseHeader::fault(&request.header, now, err.into()),
                    results: Vec::new(),
                }
            }
        };
        if decoded.timestamps_to_return.is_none() {
            return CreateMonitoredItemsResponse {
                header: ResponseHeader::fault(&request.header, now, StatusCode::BadTimestampsToReturnInvalid),
                results: Vec::new(),
            };
        }

        let mut subscriptions = self.subscriptions.write();
        let Some(subscription) = subscriptions.get_mut(&decoded.subscription_id) else {
            return CreateMonitoredItemsResponse {
                header: ResponseHeader::fault(&request.header, now, StatusCode::BadSubscriptionIdInvalid),
                results: Vec::new(),
            };
        };

        let mut results = Vec::with_capacity(decoded.items.len());
        let mut node_index = self.node_index.write();
        for item in decoded.items {
            let Some(attribute_id) = item.attribute_id else {
                results.push(MonitoredItemCreateResult {
                    status: StatusCode::BadAttributeIdInvalid,
                    monitored_item_id: 0,
                    revised_sampling_interval: 0.0,
                    revised_queue_size: 0,
                });
                continue;
            };
            let monitored_item_id = self.next_monitored_item_id.fetch_add(1, Ordering::Relaxed);
            let revised_queue_size = item.queue_size.max(1);
            let revised_sampling_interval = item.sampling_interval.max(0.0);
            subscription.monitored_items.insert(
                monitored_item_id,
                MonitoredItem {
                    id: monitored_item_id,
                    node_id: item.node_id.clone(),
                    attribute_id,
                    index_range: item.index_range.to_string(),
                    monitoring_mode: item.monitoring_mode,
                    client_handle: item.client_handle,
                    revised_sampling_interval,
                    revised_queue_size,
                    pending: VecDeque::new(),
                },
            );
            node_index.entry(item.node_id.clone()).or_default().push((subscription.id, monitored_item_id));
            results.push(MonitoredItemCreateResult {
                status: StatusCode::Ok,
                monitored_item_id,
                revised_sampling_interval,
                revised_queue_size,
            });
        }

        CreateMonitoredItemsResponse { header: ResponseHeader::ok(&request.header, now), results }
    }

    /// Write -> data-change fan-out (§4.G): push a notification onto every
    /// monitored item whose node and attribute match the written value.
    pub fn notify_data_change(&self, node_id: &NodeId, attribute_id: AttributeId, new_value: &DataValue) {
        let node_index = self.node_index.read();
        let Some(entries) = node_index.get(node_id) else { return };
        let mut subscriptions = self.subscriptions.write();
        for &(subscription_id, item_id) in entries {
            if let Some(subscription) = subscriptions.get_mut(&subscription_id) {
                if let Some(item) = subscription.monitored_items.get_mut(&item_id) {
                    if item.attribute_id == attribute_id && item.monitoring_mode != MonitoringMode::Disabled {
                        item.enqueue(new_value.clone());
                    }
                }
            }
        }
    }

    /// Queue an incoming Publish request against its session, computing the
    /// deadline from `header.timestamp + header.timeout_hint` (§4.G
    /// "Publish-request expiration").
    pub fn enqueue_publish(&self, session_id: u32, request: PublishRequest) {
        let deadline = request.header.timestamp + ChronoDuration::milliseconds(request.header.timeout_hint as i64);
        self.pending_publishes.write().entry(session_id).or_default().push_back(PendingPublish { request, deadline });
    }

    /// Drain any expired Publish requests for a session, returning a
    /// `BadTimeout` response for each (§4.G "Publish-request expiration").
    pub fn expire_publishes(&self, session_id: u32, now: DateTime<Utc>) -> Vec<PublishResponse> {
        let mut queues = self.pending_publishes.write();
        let Some(queue) = queues.get_mut(&session_id) else { return Vec::new() };
        let mut expired = Vec::new();
        let mut remaining = VecDeque::new();
        for pending in queue.drain(..) {
            if pending.deadline <= now {
                expired.push(PublishResponse {
                    header: ResponseHeader::fault(&pending.request.header, now, StatusCode::BadTimeout),
                    subscription_id: 0,
                    available_sequence_numbers: Vec::new(),
                    more_notifications: false,
                    notification_message: NotificationMessage { sequence_number: 0, publish_time: now, data_change_notifications: Vec::new() },
                    results: Vec::new(),
                });
            } else {
                remaining.push_back(pending);
            }
        }
        *queue = remaining;
        expired
    }

    /// Run one timeout tick for `subscription_id` (§4.G "Publish cycle").
    /// Returns `Some` when a notification, keep-alive, or lifetime-expiry
    /// fault was shipped to a waiting Publish request, consuming it from
    /// `session_id`'s queue. `publishing_enabled == false` only suppresses
    /// shipping and keep-alive accounting; the lifetime counter keeps
    /// advancing regardless, so a disabled subscription still expires.
    pub fn on_publish_timeout(&self, subscription_id: u32, session_id: u32, now: DateTime<Utc>) -> Option<PublishResponse> {
        let mut subscriptions = self.subscriptions.write();
        let mut queues = self.pending_publishes.write();

        let publishing_enabled = subscriptions.get(&subscription_id)?.publishing_enabled;
        let has_queued = subscriptions.get(&subscription_id).unwrap().has_queued_notifications();
        let queue = queues.entry(session_id).or_default();

        let shipped = if !publishing_enabled {
            None
        } else {
            if !has_queued && queue.front().is_some() {
                subscriptions.get_mut(&subscription_id).unwrap().keep_alive_counter += 1;
            }
            let keep_alive_due = !has_queued
                && subscriptions.get(&subscription_id).unwrap().keep_alive_counter
                    >= subscriptions.get(&subscription_id).unwrap().revised.max_keep_alive_count;
            let ready_to_ship = queue.front().is_some() && (has_queued || keep_alive_due);

            if ready_to_ship {
                let pending = queue.pop_front().unwrap();
                let message = {
                    let subscription = subscriptions.get_mut(&subscription_id).unwrap();
                    if has_queued { subscription.drain_notifications(now) } else { subscription.keep_alive(now) }
                };
                let results = acknowledge_all(&mut subscriptions, &pending.request.subscription_acknowledgements);
                let subscription = subscriptions.get(&subscription_id).unwrap();
                Some(PublishResponse {
                    header: ResponseHeader::ok(&pending.request.header, now),
                    subscription_id,
                    available_sequence_numbers: subscription.retained.iter().map(|n| n.sequence_number).collect(),
                    more_notifications: false,
                    notification_message: message,
                    results,
                })
            } else {
                None
            }
        };

        if shipped.is_some() {
            return shipped;
        }

        if let Some(subscription) = subscriptions.get_mut(&subscription_id) {
            subscription.lifetime_counter += 1;
            if subscription.lifetime_counter >= subscription.revised.lifetime_count {
                subscriptions.remove(&subscription_id);
                if let Some(pending) = queue.pop_front() {
                    return Some(PublishResponse {
                        header: ResponseHeader::fault(&pending.request.header, now, StatusCode::BadNoSubscription),
                        subscription_id,
                        available_sequence_numbers: Vec::new(),
                        more_notifications: false,
                        notification_message: NotificationMessage { sequence_number: 0, publish_time: now, data_change_notifications: Vec::new() },
                        results: Vec::new(),
                    });
                }
            }
        }

        None
    }

    /// Acknowledge one `(subscription_id, sequence_number)` pair outside of
    /// a Publish response's own piggy-backed acknowledgements (§4.G
    /// "Acknowledgements").
    pub fn acknowledge(&self, subscription_id: u32, sequence_number: u32) -> Result<(), SubscriptionError> {
        let mut subscriptions = self.subscriptions.write();
        let subscription = subscriptions.get_mut(&subscription_id).ok_or(SubscriptionError::SubscriptionIdInvalid)?;
        let before = subscription.retained.len();
        subscription.retained.retain(|n| n.sequence_number != sequence_number);
        if subscription.retained.len() == before {
            return Err(SubscriptionError::SequenceNumberUnknown);
        }
        Ok(())
    }

    /// Re-send a still-retained notification without consuming an
    /// acknowledgement slot (§4.G's `republish` supplement).
    pub fn republish(&self, subscription_id: u32, sequence_number: u32) -> Result<NotificationMessage, SubscriptionError> {
        let subscriptions = self.subscriptions.read();
        let subscription = subscriptions.get(&subscription_id).ok_or(SubscriptionError::SubscriptionIdInvalid)?;
        subscription
            .retained
            .iter()
            .find(|n| n.sequence_number == sequence_number)
            .cloned()
            .ok_or(SubscriptionError::SequenceNumberUnknown)
    }

    /// Delete every subscription owned by a session, as `CloseSession` with
    /// `delete_subscriptions=true` requires (§5 "Cancellation and
    /// timeouts").
    pub fn delete_session_subscriptions(&self, subscription_ids: &[u32]) {
        let mut subscriptions = self.subscriptions.write();
        for id in subscription_ids {
            subscriptions.remove(id);
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions.read().contains_key(&subscription_id)
    }
}

impl Default for SubscriptionEngine {
    fn default() -> Self {
        SubscriptionEngine::new()
    }
}

/// Apply a Publish request's piggy-backed acknowledgements against
/// whichever subscriptions they name, which need not be the subscription
/// whose timer just fired (§4.G "Acknowledgements").
fn acknowledge_all(subscriptions: &mut HashMap<u32, Subscription>, acks: &[ua_proto::SubscriptionAcknowledgement]) -> Vec<StatusCode> {
    acks.iter()
        .map(|ack| match subscriptions.get_mut(&ack.subscription_id) {
            None => StatusCode::BadSubscriptionIdInvalid,
            Some(subscription) => {
                let before = subscription.retained.len();
                subscription.retained.retain(|n| n.sequence_number != ack.sequence_number);
                if subscription.retained.len() == before {
                    StatusCode::BadSequenceNumberUnknown
                } else {
                    StatusCode::Ok
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_core::ScalarValue;
    use ua_proto::{MonitoredItemCreateRequest, ReadValueId, RequestHeader, TimestampsToReturn};

    fn create_request(interval: f64, lifetime: u32, keep_alive: u32, max_notif: u32) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            header: RequestHeader::dummy(Utc::now()),
            requested_publishing_interval: interval,
            requested_lifetime_count: lifetime,
            requested_max_keep_alive_count: keep_alive,
            max_notifications_per_publish: max_notif,
            publishing_enabled: true,
        }
    }

    #[test]
    fn create_subscription_clamps_to_bounds() {
        let engine = SubscriptionEngine::new();
        let response = engine.create_subscription(&create_request(0.0, 1, 1, 0));
        assert_eq!(response.revised_publishing_interval, MIN_PUBLISHING_INTERVAL_MS);
        assert_eq!(response.revised_max_keep_alive_count, MIN_KEEP_ALIVE_COUNT);
        assert_eq!(response.revised_lifetime_count, MIN_LIFETIME_COUNT.max(3 * MIN_KEEP_ALIVE_COUNT));
    }

    #[test]
    fn sequence_number_rolls_over_past_u32_max_and_never_emits_zero() {
        assert_eq!(next_sequence_number(u32::MAX), 1);
        assert_eq!(next_sequence_number(0), 1);
        assert_eq!(next_sequence_number(5), 6);
    }

    #[test]
    fn acknowledge_unknown_sequence_number_is_rejected() {
        let engine = SubscriptionEngine::new();
        let response = engine.create_subscription(&create_request(100.0, 100, 10, 0));
        let err = engine.acknowledge(response.subscription_id, 999).unwrap_err();
        assert_eq!(err, SubscriptionError::SequenceNumberUnknown);
    }

    #[test]
    fn acknowledge_unknown_subscription_is_rejected() {
        let engine = SubscriptionEngine::new();
        let err = engine.acknowledge(404, 1).unwrap_err();
        assert_eq!(err, SubscriptionError::SubscriptionIdInvalid);
    }

    #[test]
    fn write_fan_out_enqueues_notification_for_monitored_item() {
        let engine = SubscriptionEngine::new();
        let sub = engine.create_subscription(&create_request(100.0, 100, 10, 0));
        let node_id = NodeId::numeric(1, 7);
        let create_items = CreateMonitoredItemsRequest {
            header: RequestHeader::dummy(Utc::now()),
            subscription_id: sub.subscription_id,
            timestamps_to_return: Some(TimestampsToReturn::Neither),
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId { node_id: node_id.clone(), attribute_id: AttributeId::Value.as_wire(), index_range: String::new() },
                monitoring_mode: MonitoringMode::Reporting,
                client_handle: 42,
                sampling_interval: 0.0,
                queue_size: 1,
                discard_oldest: true,
            }],
        };
        let result = engine.create_monitored_items(&create_items);
        assert_eq!(result.results[0].status, StatusCode::Ok);

        engine.notify_data_change(
            &node_id,
            AttributeId::Value,
            &DataValue::new(ua_core::Variant::Scalar(ScalarValue::Int32(42)), StatusCode::Ok),
        );

        let mut subscriptions = engine.subscriptions.write();
        let subscription = subscriptions.get_mut(&sub.subscription_id).unwrap();
        assert!(subscription.has_queued_notifications());
    }

    #[test]
    fn create_monitored_items_rejects_invalid_timestamps_to_return() {
        let engine = SubscriptionEngine::new();
        let sub = engine.create_subscription(&create_request(100.0, 100, 10, 0));
        let create_items = CreateMonitoredItemsRequest {
            header: RequestHeader::dummy(Utc::now()),
            subscription_id: sub.subscription_id,
            timestamps_to_return: None,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId { node_id: NodeId::numeric(1, 9), attribute_id: AttributeId::Value.as_wire(), index_range: String::new() },
                monitoring_mode: MonitoringMode::Reporting,
                client_handle: 1,
                sampling_interval: 0.0,
                queue_size: 1,
                discard_oldest: true,
            }],
        };
        let response = engine.create_monitored_items(&create_items);
        assert_eq!(response.header.service_result, StatusCode::BadTimestampsToReturnInvalid);
        assert!(response.results.is_empty());
    }

    #[test]
    fn republish_returns_a_retained_notification_by_sequence_number() {
        let engine = SubscriptionEngine::new();
        let sub = engine.create_subscription(&create_request(100.0, 100, 10, 0));
        let node_id = NodeId::numeric(1, 8);
        let create_items = CreateMonitoredItemsRequest {
            header: RequestHeader::dummy(Utc::now()),
            subscription_id: sub.subscription_id,
            timestamps_to_return: Some(TimestampsToReturn::Neither),
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId { node_id: node_id.clone(), attribute_id: AttributeId::Value.as_wire(), index_range: String::new() },
                monitoring_mode: MonitoringMode::Reporting,
                client_handle: 1,
                sampling_interval: 0.0,
                queue_size: 1,
                discard_oldest: true,
            }],
        };
        engine.create_monitored_items(&create_items);
        engine.notify_data_change(
            &node_id,
            AttributeId::Value,
            &DataValue::new(ua_core::Variant::Scalar(ScalarValue::Int32(7)), StatusCode::Ok),
        );
        engine.enqueue_publish(
            1,
            PublishRequest { header: RequestHeader::dummy(Utc::now()), subscription_acknowledgements: Vec::new() },
        );
        let response = engine.on_publish_timeout(sub.subscription_id, 1, Utc::now()).unwrap();
        let sequence_number = response.notification_message.sequence_number;

        let republished = engine.republish(sub.subscription_id, sequence_number).unwrap();
        assert_eq!(republished.sequence_number, sequence_number);
    }

    #[test]
    fn republish_rejects_unknown_sequence_number_and_unknown_subscription() {
        let engine = SubscriptionEngine::new();
        let sub = engine.create_subscription(&create_request(100.0, 100, 10, 0));
        assert_eq!(engine.republish(sub.subscription_id, 999).unwrap_err(), SubscriptionError::SequenceNumberUnknown);
        assert_eq!(engine.republish(404, 1).unwrap_err(), SubscriptionError::SubscriptionIdInvalid);
    }

    #[test]
    fn subscription_is_deleted_once_lifetime_counter_expires() {
        let engine = SubscriptionEngine::new();
        let response = engine.create_subscription(&create_request(100.0, 10, 3, 0));
        let lifetime = response.revised_lifetime_count;
        for _ in 0..lifetime {
            engine.on_publish_timeout(response.subscription_id, 1, Utc::now());
        }
        assert_eq!(engine.subscription_count(), 0);
    }

    #[test]
    fn queued_publish_completes_bad_no_subscription_on_lifetime_expiry() {
        let engine = SubscriptionEngine::new();
        let response = engine.create_subscription(&create_request(100.0, 10, 3, 0));
        let lifetime = response.revised_lifetime_count;
        engine.enqueue_publish(
            1,
            PublishRequest { header: RequestHeader::dummy(Utc::now()), subscription_acknowledgements: Vec::new() },
        );
        let mut last = None;
        for _ in 0..lifetime {
            last = engine.on_publish_timeout(response.subscription_id, 1, Utc::now());
        }
        assert_eq!(engine.subscription_count(), 0);
        let response = last.expect("queued Publish request should complete once the subscription expires");
        assert_eq!(response.header.service_result, StatusCode::BadNoSubscription);
    }

    #[test]
    fn disabled_subscription_still_advances_lifetime_counter_and_expires() {
        let engine = SubscriptionEngine::new();
        let response = engine.create_subscription(&create_request(100.0, 10, 3, 0));
        engine.set_publishing_mode(&SetPublishingModeRequest {
            header: RequestHeader::dummy(Utc::now()),
            publishing_enabled: false,
            subscription_ids: vec![response.subscription_id],
        });
        let lifetime = response.revised_lifetime_count;
        for _ in 0..lifetime {
            engine.on_publish_timeout(response.subscription_id, 1, Utc::now());
        }
        assert_eq!(engine.subscription_count(), 0);
    }
}
