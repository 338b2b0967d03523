//! Request Decoders (§4.D): per-service validators that project a decoded
//! request onto per-item parameter tuples, keyed by a 1-based item index.
//!
//! No direct teacher analogue (the teacher daemon decodes one gossip-event
//! shape, not a dozen distinct per-item request forms); grounded instead on
//! `original_source/csrc/services/b2c/service_*_decode_bs.c`'s
//! validate-then-accessor shape, translated into `Vec`-returning Rust. The
//! 1-based indices are a formal-model artefact (§9 "Formal-model 1-based
//! indices") that decoders expose and convert at the boundary; internally
//! everything is 0-based `Vec` indexing.

use thiserror::Error;
use ua_core::{AttributeId, NodeId, NumericRangeParseError, StatusCode, Variant};
use ua_proto::{
    BrowseDescription, BrowseDirection, BrowseRequest, CreateMonitoredItemsRequest,
    MonitoredItemCreateRequest, MonitoringMode, ReadRequest, TimestampsToReturn, WriteRequest, WriteValue,
};

/// Whole-request validation failures (§7 "Input validation"): the caller
/// replies with a `ServiceFault` carrying the status and never processes
/// individual items.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("no operations requested")]
    NothingToDo,
    #[error("too many operations requested")]
    TooManyOperations,
    #[error("MaxAge must be non-negative")]
    MaxAgeInvalid,
    #[error("unsupported TimestampsToReturn value")]
    TimestampsToReturnInvalid,
}

impl From<RequestValidationError> for StatusCode {
    fn from(err: RequestValidationError) -> StatusCode {
        match err {
            RequestValidationError::NothingToDo => StatusCode::BadNothingToDo,
            RequestValidationError::TooManyOperations => StatusCode::BadTooManyOperations,
            RequestValidationError::MaxAgeInvalid => StatusCode::BadMaxAgeInvalid,
            RequestValidationError::TimestampsToReturnInvalid => StatusCode::BadTimestampsToReturnInvalid,
        }
    }
}

/// `n <= 0 -> BadNothingToDo`, `n > max -> BadTooManyOperations` (§4.D step 2).
fn validate_operation_count(n: usize, max_operations: u32) -> Result<(), RequestValidationError> {
    if n == 0 {
        return Err(RequestValidationError::NothingToDo);
    }
    if n as u64 > max_operations as u64 {
        return Err(RequestValidationError::TooManyOperations);
    }
    Ok(())
}

// =============================================================================
// READ
// =============================================================================

/// A single decoded Read item, exposed at a 1-based `item_index`.
pub struct ReadItem<'a> {
    pub item_index: usize,
    pub node_id: &'a NodeId,
    pub attribute_id: Option<AttributeId>,
    pub index_range: &'a str,
}

pub struct DecodedRead<'a> {
    pub max_age: f64,
    pub timestamps_to_return: TimestampsToReturn,
    pub items: Vec<ReadItem<'a>>,
}

pub fn decode_read(request: &ReadRequest, max_operations: u32) -> Result<DecodedRead<'_>, RequestValidationError> {
    validate_operation_count(request.nodes_to_read.len(), max_operations)?;
    if request.max_age < 0.0 {
        return Err(RequestValidationError::MaxAgeInvalid);
    }
    let items = request
        .nodes_to_read
        .iter()
        .enumerate()
        .map(|(i, item)| ReadItem {
            item_index: i + 1,
            node_id: &item.node_id,
            attribute_id: AttributeId::from_wire(item.attribute_id),
            index_range: &item.index_range,
        })
        .collect();
    Ok(DecodedRead { max_age: request.max_age, timestamps_to_return: request.timestamps_to_return, items })
}

// =============================================================================
// WRITE
// =============================================================================

/// A single decoded Write item. An unknown `AttributeId` is tagged inline
/// (`attribute_id: None`) rather than rejected — the item stays in the
/// request and its per-item result carries `BadAttributeIdInvalid` (§4.D).
pub struct WriteItem<'a> {
    pub item_index: usize,
    pub node_id: &'a NodeId,
    pub attribute_id: Option<AttributeId>,
    pub value: &'a Variant,
    pub index_range: &'a str,
}

pub fn decode_write<'a>(
    request: &'a WriteRequest,
    max_operations: u32,
) -> Result<Vec<WriteItem<'a>>, RequestValidationError> {
    validate_operation_count(request.nodes_to_write.len(), max_operations)?;
    Ok(request
        .nodes_to_write
        .iter()
        .enumerate()
        .map(|(i, item): (usize, &'a WriteValue)| WriteItem {
            item_index: i + 1,
            node_id: &item.node_id,
            attribute_id: AttributeId::from_wire(item.attribute_id),
            value: &item.value.value,
            index_range: &item.index_range,
        })
        .collect())
}

// =============================================================================
// BROWSE
// =============================================================================

pub struct BrowseItem<'a> {
    pub item_index: usize,
    pub node_id: &'a NodeId,
    pub direction: BrowseDirection,
    pub reference_type_filter: Option<&'a NodeId>,
    pub include_subtypes: bool,
}

pub struct DecodedBrowse<'a> {
    pub requested_max_references_per_node: u32,
    pub items: Vec<BrowseItem<'a>>,
}

pub fn decode_browse(
    request: &BrowseRequest,
    max_operations: u32,
) -> Result<DecodedBrowse<'_>, RequestValidationError> {
    validate_operation_count(request.nodes_to_browse.len(), max_operations)?;
    let clamped = if request.requested_max_references_per_node == 0 {
        max_operations
    } else {
        request.requested_max_references_per_node.clamp(1, max_operations)
    };
    let items = request
        .nodes_to_browse
        .iter()
        .enumerate()
        .map(|(i, item): (usize, &BrowseDescription)| BrowseItem {
            item_index: i + 1,
            node_id: &item.node_id,
            direction: item.browse_direction,
            reference_type_filter: item.reference_type_id.as_ref(),
            include_subtypes: item.include_subtypes,
        })
        .collect();
    Ok(DecodedBrowse { requested_max_references_per_node: clamped, items })
}

// =============================================================================
// CREATEMONITOREDITEMS
// =============================================================================

pub struct MonitoredItemSpec<'a> {
    pub item_index: usize,
    pub node_id: &'a NodeId,
    pub attribute_id: Option<AttributeId>,
    pub index_range: &'a str,
    pub monitoring_mode: MonitoringMode,
    pub client_handle: u32,
    pub sampling_interval: f64,
    pub queue_size: u32,
}

pub struct DecodedCreateMonitoredItems<'a> {
    pub subscription_id: u32,
    /// `None` marks an invalid `TimestampsToReturn` value (§4.D "indet
    /// sentinel"); the handler turns that into `BadTimestampsToReturnInvalid`.
    pub timestamps_to_return: Option<TimestampsToReturn>,
    pub items: Vec<MonitoredItemSpec<'a>>,
}

pub fn decode_create_monitored_items(
    request: &CreateMonitoredItemsRequest,
    max_operations: u32,
) -> Result<DecodedCreateMonitoredItems<'_>, RequestValidationError> {
    validate_operation_count(request.items_to_create.len(), max_operations)?;
    let items = request
        .items_to_create
        .iter()
        .enumerate()
        .map(|(i, item): (usize, &MonitoredItemCreateRequest)| MonitoredItemSpec {
            item_index: i + 1,
            node_id: &item.item_to_monitor.node_id,
            attribute_id: AttributeId::from_wire(item.item_to_monitor.attribute_id),
            index_range: &item.item_to_monitor.index_range,
            monitoring_mode: item.monitoring_mode,
            client_handle: item.client_handle,
            sampling_interval: item.sampling_interval,
            queue_size: item.queue_size.min(i32::MAX as u32),
        })
        .collect();
    Ok(DecodedCreateMonitoredItems {
        subscription_id: request.subscription_id,
        timestamps_to_return: request.timestamps_to_return,
        items,
    })
}

/// Translate a malformed numeric-range string into the per-item status the
/// handler should report, rather than aborting the whole request (§4.D).
pub fn index_range_status(err: &NumericRangeParseError) -> StatusCode {
    let _ = err;
    StatusCode::BadIndexRangeInvalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ua_proto::RequestHeader;

    fn header() -> RequestHeader {
        RequestHeader::dummy(Utc::now())
    }

    #[test]
    fn decode_read_rejects_empty_item_list() {
        let request = ReadRequest {
            header: header(),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Vec::new(),
        };
        assert_eq!(decode_read(&request, 10).unwrap_err(), RequestValidationError::NothingToDo);
    }

    #[test]
    fn decode_read_rejects_too_many_operations() {
        let request = ReadRequest {
            header: header(),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![
                ua_proto::ReadValueId { node_id: NodeId::null(), attribute_id: 13, index_range: String::new() };
                3
            ],
        };
        assert_eq!(decode_read(&request, 2).unwrap_err(), RequestValidationError::TooManyOperations);
    }

    #[test]
    fn decode_read_rejects_negative_max_age() {
        let request = ReadRequest {
            header: header(),
            max_age: -1.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ua_proto::ReadValueId {
                node_id: NodeId::null(),
                attribute_id: 13,
                index_range: String::new(),
            }],
        };
        assert_eq!(decode_read(&request, 10).unwrap_err(), RequestValidationError::MaxAgeInvalid);
    }

    #[test]
    fn decode_read_indices_are_one_based() {
        let request = ReadRequest {
            header: header(),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![
                ua_proto::ReadValueId { node_id: NodeId::null(), attribute_id: 13, index_range: String::new() },
                ua_proto::ReadValueId { node_id: NodeId::null(), attribute_id: 13, index_range: String::new() },
            ],
        };
        let decoded = decode_read(&request, 10).unwrap();
        assert_eq!(decoded.items[0].item_index, 1);
        assert_eq!(decoded.items[1].item_index, 2);
    }

    #[test]
    fn decode_write_tags_unknown_attribute_inline_instead_of_rejecting() {
        let request = WriteRequest {
            header: header(),
            nodes_to_write: vec![ua_proto::WriteValue {
                node_id: NodeId::null(),
                attribute_id: 9999,
                index_range: String::new(),
                value: ua_core::DataValue::new(Variant::Null, StatusCode::Ok),
            }],
        };
        let decoded = decode_write(&request, 10).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].attribute_id.is_none());
    }

    #[test]
    fn decode_browse_clamps_zero_to_max_operations() {
        let request = BrowseRequest {
            header: header(),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::null(),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: None,
                include_subtypes: false,
            }],
        };
        let decoded = decode_browse(&request, 50).unwrap();
        assert_eq!(decoded.requested_max_references_per_node, 50);
    }
}
