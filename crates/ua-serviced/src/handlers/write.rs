//! Write handler (§4.F "Write").

use chrono::Utc;
use ua_core::{DataValue, NodeId, StatusCode, Variant};
use ua_proto::{WriteRequest, WriteResponse, ResponseHeader};

use crate::address_space::AddressSpace;
use crate::decode::decode_write;

pub const MAX_OPERATIONS_PER_MESSAGE: u32 = 1000;

/// `(user, node, attribute, Write) -> bool` (§4.F "Write"): the external
/// authorization callback. Kept as a trait object so `ServerCore` can wire
/// in whatever policy the deployment needs without this handler depending
/// on session types.
pub trait WriteAuthorizer {
    fn authorize(&self, node_id: &NodeId, attribute_id: ua_core::AttributeId) -> bool;
}

/// A permissive authorizer for tests and fixtures.
pub struct AllowAll;

impl WriteAuthorizer for AllowAll {
    fn authorize(&self, _node_id: &NodeId, _attribute_id: ua_core::AttributeId) -> bool {
        true
    }
}

/// Emitted onto the internal event queue for the subscription engine's
/// write-triggered fan-out (§4.F "Write", §8 invariant 3). Both values
/// reference the same node id.
#[derive(Clone, Debug, PartialEq)]
pub struct DataChangeEvent {
    pub node_id: NodeId,
    pub attribute_id: ua_core::AttributeId,
    pub old_value: DataValue,
    pub new_value: DataValue,
}

pub fn handle_write(
    address_space: &AddressSpace,
    authorizer: &dyn WriteAuthorizer,
    request: &WriteRequest,
) -> (WriteResponse, Vec<DataChangeEvent>) {
    let now = Utc::now();
    let decoded = match decode_write(request, MAX_OPERATIONS_PER_MESSAGE) {
        Ok(decoded) => decoded,
        Err(err) => {
            let response = WriteResponse {
                header: ResponseHeader::fault(&request.header, now, err.into()),
                results: Vec::new(),
            };
            return (response, Vec::new());
        }
    };

    let mut results = Vec::with_capacity(decoded.len());
    let mut events = Vec::new();

    for item in decoded {
        let Some(attribute_id) = item.attribute_id else {
            results.push(StatusCode::BadAttributeIdInvalid);
            continue;
        };
        if !authorizer.authorize(item.node_id, attribute_id) {
            results.push(StatusCode::BadUserAccessDenied);
            continue;
        }

        let write_result = if item.index_range.is_empty() {
            address_space
                .write_value_full(item.node_id, DataValue::new(item.value.clone(), StatusCode::Ok))
                .map(|previous| (previous, item.value.clone()))
        } else {
            address_space
                .write_value_indexed(item.node_id, item.value.clone(), item.index_range)
                .map(|previous| {
                    let new_whole = address_space
                        .read_attribute(item.node_id, ua_core::AttributeId::Value, None)
                        .unwrap_or(Variant::Null);
                    (previous, new_whole)
                })
        };

        match write_result {
            Ok((previous, new_value)) => {
                results.push(StatusCode::Ok);
                events.push(DataChangeEvent {
                    node_id: item.node_id.clone(),
                    attribute_id,
                    old_value: previous,
                    new_value: DataValue::new(new_value, StatusCode::Ok),
                });
            }
            Err(err) => results.push((&err).into()),
        }
    }

    (WriteResponse { header: ResponseHeader::ok(&request.header, now), results }, events)
}
