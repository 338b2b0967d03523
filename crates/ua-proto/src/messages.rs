//! Per-service request/response bodies and the headers common to all of
//! them (§6 "Wire protocol").
//!
//! Field names and ordering for `RequestHeader` follow the real-world
//! `async-opcua` crate's `RequestHeader`; everything else is named after the
//! service parameters spec.md enumerates in §4.D/§4.E/§4.F/§4.G/§4.H. The
//! on-wire byte layout itself is an external collaborator (`WireCodec`) —
//! these are the typed, already-decoded shapes the service layer operates
//! on.

use serde::{Deserialize, Serialize};
use ua_core::{DataValue, ExpandedNodeId, LocalizedText, NodeClass, NodeId, QualifiedName, StatusCode, Variant};

use chrono::{DateTime, Utc};

// =============================================================================
// HEADERS
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestHeader {
    pub authentication_token: NodeId,
    pub timestamp: DateTime<Utc>,
    pub request_handle: u32,
    pub timeout_hint: u32,
}

impl RequestHeader {
    /// A header with no authentication token and an immediate timestamp,
    /// useful for discovery-before-session requests (`GetEndpoints`) and in
    /// tests.
    pub fn dummy(timestamp: DateTime<Utc>) -> Self {
        RequestHeader {
            authentication_token: NodeId::null(),
            timestamp,
            request_handle: 0,
            timeout_hint: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResponseHeader {
    pub timestamp: DateTime<Utc>,
    pub request_handle: u32,
    pub service_result: StatusCode,
}

impl ResponseHeader {
    pub fn ok(request: &RequestHeader, now: DateTime<Utc>) -> Self {
        ResponseHeader { timestamp: now, request_handle: request.request_handle, service_result: StatusCode::Ok }
    }

    pub fn fault(request: &RequestHeader, now: DateTime<Utc>, status: StatusCode) -> Self {
        ResponseHeader { timestamp: now, request_handle: request.request_handle, service_result: status }
    }
}

// =============================================================================
// READ (§4.D, §4.E, §4.F "Read")
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimestampsToReturn {
    Source,
    Server,
    Both,
    Neither,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadRequest {
    pub header: RequestHeader,
    pub max_age: f64,
    pub timestamps_to_return: TimestampsToReturn,
    pub nodes_to_read: Vec<ReadValueId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadResponse {
    pub header: ResponseHeader,
    pub results: Vec<DataValue>,
}

// =============================================================================
// WRITE (§4.D, §4.F "Write")
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WriteValue {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: String,
    pub value: DataValue,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WriteRequest {
    pub header: RequestHeader,
    pub nodes_to_write: Vec<WriteValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WriteResponse {
    pub header: ResponseHeader,
    pub results: Vec<StatusCode>,
}

// =============================================================================
// BROWSE / BROWSENEXT (§4.D, §4.E, §4.F "Browse")
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BrowseDirection {
    Forward,
    Inverse,
    Both,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseDescription {
    pub node_id: NodeId,
    pub browse_direction: BrowseDirection,
    pub reference_type_id: Option<NodeId>,
    pub include_subtypes: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseRequest {
    pub header: RequestHeader,
    pub requested_max_references_per_node: u32,
    pub nodes_to_browse: Vec<BrowseDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReferenceDescription {
    pub reference_type_id: NodeId,
    pub is_forward: bool,
    pub target_node_id: ExpandedNodeId,
    pub browse_name: Option<QualifiedName>,
    pub display_name: Option<LocalizedText>,
    pub node_class: Option<NodeClass>,
    pub type_definition: Option<ExpandedNodeId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseResult {
    pub status: StatusCode,
    pub continuation_point: Vec<u8>,
    pub references: Vec<ReferenceDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseResponse {
    pub header: ResponseHeader,
    pub results: Vec<BrowseResult>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseNextRequest {
    pub header: RequestHeader,
    pub release_continuation_points: bool,
    pub continuation_points: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseNextResponse {
    pub header: ResponseHeader,
    pub results: Vec<BrowseResult>,
}

// =============================================================================
// SUBSCRIPTIONS (§4.D, §4.G)
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateSubscriptionRequest {
    pub header: RequestHeader,
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub priority: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateSubscriptionResponse {
    pub header: ResponseHeader,
    pub subscription_id: u32,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModifySubscriptionRequest {
    pub header: RequestHeader,
    pub subscription_id: u32,
    pub requested_publishing_interval: f64,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModifySubscriptionResponse {
    pub header: ResponseHeader,
    pub revised_publishing_interval: f64,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MonitoringMode {
    Disabled,
    Sampling,
    Reporting,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonitoredItemCreateRequest {
    pub item_to_monitor: ReadValueId,
    pub monitoring_mode: MonitoringMode,
    pub client_handle: u32,
    pub sampling_interval: f64,
    pub queue_size: u32,
    pub discard_oldest: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateMonitoredItemsRequest {
    pub header: RequestHeader,
    pub subscription_id: u32,
    pub timestamps_to_return: Option<TimestampsToReturn>,
    pub items_to_create: Vec<MonitoredItemCreateRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonitoredItemCreateResult {
    pub status: StatusCode,
    pub monitored_item_id: u32,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateMonitoredItemsResponse {
    pub header: ResponseHeader,
    pub results: Vec<MonitoredItemCreateResult>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PublishRequest {
    pub header: RequestHeader,
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTime<Utc>,
    pub data_change_notifications: Vec<MonitoredItemNotification>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PublishResponse {
    pub header: ResponseHeader,
    pub subscription_id: u32,
    pub available_sequence_numbers: Vec<u32>,
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    pub results: Vec<StatusCode>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetPublishingModeRequest {
    pub header: RequestHeader,
    pub publishing_enabled: bool,
    pub subscription_ids: Vec<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetPublishingModeResponse {
    pub header: ResponseHeader,
    pub results: Vec<StatusCode>,
}

/// Re-request a still-retained notification message without consuming an
/// acknowledgement slot (§4.G supplement).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RepublishRequest {
    pub header: RequestHeader,
    pub subscription_id: u32,
    pub retransmit_sequence_number: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RepublishResponse {
    pub header: ResponseHeader,
    pub notification_message: NotificationMessage,
}

// =============================================================================
// CALL (§4.F "Call")
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallMethodRequest {
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub input_arguments: Vec<Variant>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallRequest {
    pub header: RequestHeader,
    pub methods_to_call: Vec<CallMethodRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallMethodResult {
    pub status: StatusCode,
    pub input_argument_results: Vec<StatusCode>,
    pub output_arguments: Vec<Variant>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallResponse {
    pub header: ResponseHeader,
    pub results: Vec<CallMethodResult>,
}

// =============================================================================
// GETENDPOINTS (§4.F "GetEndpoints")
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GetEndpointsRequest {
    pub header: RequestHeader,
    pub endpoint_url: String,
    pub profile_uris: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageSecurityMode {
    None,
    Sign,
    SignAndEncrypt,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApplicationDescription {
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: LocalizedText,
    pub discovery_urls: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EndpointDescription {
    pub endpoint_url: String,
    pub server: ApplicationDescription,
    pub security_policy_uri: String,
    pub security_mode: MessageSecurityMode,
    pub security_level: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GetEndpointsResponse {
    pub header: ResponseHeader,
    pub endpoints: Vec<EndpointDescription>,
}

// =============================================================================
// SESSION / CHANNEL (§4.H)
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionRequest {
    pub header: RequestHeader,
    pub client_description: ApplicationDescription,
    pub server_uri: String,
    pub endpoint_url: String,
    pub session_name: String,
    pub requested_session_timeout: f64,
    pub max_response_message_size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionResponse {
    pub header: ResponseHeader,
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub revised_session_timeout: f64,
    pub server_nonce: Vec<u8>,
    pub server_endpoints: Vec<EndpointDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum UserIdentityToken {
    Anonymous,
    UserName { user_name: String, password: Vec<u8> },
    Certificate { certificate_data: Vec<u8> },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivateSessionRequest {
    pub header: RequestHeader,
    pub user_identity_token: UserIdentityToken,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivateSessionResponse {
    pub header: ResponseHeader,
    pub server_nonce: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CloseSessionRequest {
    pub header: RequestHeader,
    pub delete_subscriptions: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CloseSessionResponse {
    pub header: ResponseHeader,
}

// =============================================================================
// SERVICE FAULT
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceFault {
    pub header: ResponseHeader,
}
