//! Client-side discovery-before-channel queue (§4.H): requests enqueued
//! before a secure channel exists, held per-channel in a bounded FIFO and
//! drained once the channel comes up.
//!
//! Grounded on `sync.rs`'s bounded `VecDeque` usage (`PeerSyncState`'s
//! backlog) generalised to a fixed capacity with an explicit rejection path
//! rather than an unbounded queue.

use std::collections::VecDeque;

use thiserror::Error;
use ua_core::StatusCode;
use ua_proto::GetEndpointsRequest;

/// `APP_TO_SE_SEND_DISCOVERY_REQUEST` queue bound (§4.H).
pub const MAX_QUEUED_DISCOVERY_REQUESTS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryQueueError {
    #[error("discovery request queue is full")]
    QueueFull,
}

/// One request held until the channel connects, or failed with
/// `SE_SND_REQUEST_FAILED` on final connection failure (§4.H).
pub struct PendingDiscoveryRequest {
    pub request: GetEndpointsRequest,
}

/// A per-channel FIFO of `GetEndpoints` requests queued before the secure
/// channel is up.
pub struct DiscoveryRequestQueue {
    pending: VecDeque<PendingDiscoveryRequest>,
}

impl DiscoveryRequestQueue {
    pub fn new() -> Self {
        DiscoveryRequestQueue { pending: VecDeque::new() }
    }

    pub fn enqueue(&mut self, request: GetEndpointsRequest) -> Result<(), DiscoveryQueueError> {
        if self.pending.len() >= MAX_QUEUED_DISCOVERY_REQUESTS {
            return Err(DiscoveryQueueError::QueueFull);
        }
        self.pending.push_back(PendingDiscoveryRequest { request });
        Ok(())
    }

    /// Drain the queue in arrival order for dispatch once the channel
    /// connects (§4.H "drained and each request is dispatched").
    pub fn drain(&mut self) -> Vec<PendingDiscoveryRequest> {
        self.pending.drain(..).collect()
    }

    /// Fail every still-queued request on final connection failure,
    /// returning the status each one's upcall should carry (§4.H:
    /// `SE_SND_REQUEST_FAILED` with status `Closed`).
    pub fn fail_all(&mut self) -> Vec<(PendingDiscoveryRequest, StatusCode)> {
        self.pending.drain(..).map(|pending| (pending, StatusCode::BadConnectionClosed)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for DiscoveryRequestQueue {
    fn default() -> Self {
        DiscoveryRequestQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ua_proto::RequestHeader;

    fn request() -> GetEndpointsRequest {
        GetEndpointsRequest {
            header: RequestHeader::dummy(Utc::now()),
            endpoint_url: "opc.tcp://localhost:4840".into(),
            profile_uris: Vec::new(),
        }
    }

    #[test]
    fn enqueue_rejects_past_capacity() {
        let mut queue = DiscoveryRequestQueue::new();
        for _ in 0..MAX_QUEUED_DISCOVERY_REQUESTS {
            queue.enqueue(request()).unwrap();
        }
        assert_eq!(queue.enqueue(request()).unwrap_err(), DiscoveryQueueError::QueueFull);
    }

    #[test]
    fn drain_returns_requests_in_arrival_order_and_empties_queue() {
        let mut queue = DiscoveryRequestQueue::new();
        queue.enqueue(request()).unwrap();
        queue.enqueue(request()).unwrap();
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn fail_all_reports_connection_closed_for_every_pending_request() {
        let mut queue = DiscoveryRequestQueue::new();
        queue.enqueue(request()).unwrap();
        let failed = queue.fail_all();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1, StatusCode::BadConnectionClosed);
        assert!(queue.is_empty());
    }
}
