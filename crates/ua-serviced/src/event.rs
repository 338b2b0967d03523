//! The event-dispatcher loop's event shapes (§5 "Concurrency & resource
//! model"): everything that crosses into the single-threaded `ServerCore`
//! does so as one of these two enums, posted onto the normal or priority
//! queue.
//!
//! Grounded on `gossipd::server::Server::run`'s `tokio::select!` arms
//! (listener-accept, shutdown-broadcast): the same shape, with the
//! accept-loop arm replaced by a channel receive (the transport is an
//! external collaborator, per `SPEC_FULL.md` §6) and a third arm added for
//! the priority queue.

use tokio::sync::oneshot;
use ua_proto::{RequestBody, ResponseBody};

/// A decoded request plus the channel its response is delivered on. The
/// wire codec and transport (external collaborators) are responsible for
/// decoding the request and for writing the eventual response back to the
/// wire; this crate only ever sees the typed body.
pub struct RequestEnvelope {
    pub body: RequestBody,
    pub reply: oneshot::Sender<ResponseBody>,
}

/// Normal-priority events: FIFO, processed after the priority queue is
/// drained each iteration (§5 "Ordering guarantees").
pub enum CoreEvent {
    Request(RequestEnvelope),
}

/// Higher-priority events (§5: "only used for
/// `SE_TO_SE_SERVER_SEND_ASYNC_PUB_RESP_PRIO`"), delivered before any
/// normal-priority event already queued.
pub enum PriorityEvent {
    /// A subscription's publish-interval timer fired.
    PublishCycleTimeout { subscription_id: u32 },
    /// A session's pending Publish requests should be swept for deadline
    /// expiry (§4.G "Publish-request expiration").
    SweepExpiredPublishes { session_key: u32 },
}
