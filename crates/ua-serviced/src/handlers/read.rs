//! Read handler (§4.F "Read").

use chrono::Utc;
use ua_core::{AttributeId, DataValue, StatusCode, Variant};
use ua_proto::{ReadRequest, ReadResponse, ResponseHeader};

use crate::address_space::AddressSpace;
use crate::decode::decode_read;
use crate::encode::ReadResultBuilder;

pub const MAX_OPERATIONS_PER_MESSAGE: u32 = 1000;

/// `BadTimestampsToReturnInvalid` and `BadMaxAgeInvalid` are request-level
/// (§4.F); everything else is per-item.
pub fn handle_read(address_space: &AddressSpace, request: &ReadRequest) -> ReadResponse {
    let now = Utc::now();
    let decoded = match decode_read(request, MAX_OPERATIONS_PER_MESSAGE) {
        Ok(decoded) => decoded,
        Err(err) => return fault(request, now, err.into()),
    };

    let mut builder = ReadResultBuilder::new(decoded.items.len(), decoded.timestamps_to_return, now);
    for item in decoded.items {
        // An unrecognized wire attribute id is never `Value`, so any
        // non-`Value` placeholder here withholds `SourceTimestamp` correctly.
        let Some(attribute_id) = item.attribute_id else {
            builder.push(AttributeId::NodeId, DataValue::new(Variant::Null, StatusCode::BadAttributeIdInvalid));
            continue;
        };
        if attribute_id == AttributeId::Value {
            match address_space.read(item.node_id) {
                None => {
                    builder.push(attribute_id, DataValue::new(Variant::Null, StatusCode::BadNodeIdUnknown));
                    continue;
                }
                Some(node) if node.variable_data().is_none() => {
                    builder.push(attribute_id, DataValue::new(Variant::Null, StatusCode::BadAttributeIdInvalid));
                    continue;
                }
                Some(_) => {}
            }
        } else if address_space.read(item.node_id).is_none() {
            builder.push(attribute_id, DataValue::new(Variant::Null, StatusCode::BadNodeIdUnknown));
            continue;
        }

        let range = (!item.index_range.is_empty()).then_some(item.index_range);
        match address_space.read_attribute(item.node_id, attribute_id, range) {
            Ok(value) => builder.push(attribute_id, DataValue::new(value, StatusCode::Ok)),
            Err(err) => builder.push(attribute_id, DataValue::new(Variant::Null, (&err).into())),
        }
    }

    builder.finalize(ResponseHeader::ok(&request.header, now))
}

fn fault(request: &ReadRequest, now: chrono::DateTime<Utc>, status: StatusCode) -> ReadResponse {
    ReadResponse { header: ResponseHeader::fault(&request.header, now, status), results: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_core::{AccessLevel, LocalizedText, Node, NodeClass, NodeHeader, NodeId, QualifiedName, ScalarValue, VariableData};
    use ua_proto::{ReadValueId, RequestHeader, TimestampsToReturn};

    fn space_with_variable(id: NodeId, value: Variant) -> AddressSpace {
        let space = AddressSpace::new();
        space
            .configure([Node::Variable(
                NodeHeader {
                    node_id: id,
                    node_class: NodeClass::Variable,
                    browse_name: QualifiedName::new(1, "V"),
                    display_name: LocalizedText::new("en", "V"),
                    description: None,
                    references: Vec::new(),
                },
                VariableData {
                    value,
                    data_type: NodeId::numeric(0, 6),
                    value_rank: -1,
                    access_level: AccessLevel::READ_WRITE,
                    value_status: StatusCode::Ok,
                },
            )])
            .unwrap();
        space
    }

    #[test]
    fn read_unknown_node_returns_bad_node_id_unknown_with_null_value() {
        let space = AddressSpace::new();
        space.configure([]).unwrap();
        let request = ReadRequest {
            header: RequestHeader::dummy(Utc::now()),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId {
                node_id: NodeId::numeric(2, 999),
                attribute_id: AttributeId::Value.as_wire(),
                index_range: String::new(),
            }],
        };
        let response = handle_read(&space, &request);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].status, StatusCode::BadNodeIdUnknown);
        assert_eq!(response.results[0].value, Variant::Null);
        assert_eq!(response.header.service_result, StatusCode::Ok);
    }

    #[test]
    fn read_value_on_existing_variable_succeeds() {
        let id = NodeId::numeric(1, 1);
        let space = space_with_variable(id.clone(), Variant::Scalar(ScalarValue::Int32(7)));
        let request = ReadRequest {
            header: RequestHeader::dummy(Utc::now()),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId { node_id: id, attribute_id: AttributeId::Value.as_wire(), index_range: String::new() }],
        };
        let response = handle_read(&space, &request);
        assert_eq!(response.results[0].status, StatusCode::Ok);
        assert_eq!(response.results[0].value, Variant::Scalar(ScalarValue::Int32(7)));
        assert!(response.results[0].source_timestamp.is_some());
        assert!(response.results[0].server_timestamp.is_some());
    }

    #[test]
    fn reading_non_value_attribute_withholds_source_timestamp() {
        let id = NodeId::numeric(1, 4);
        let space = space_with_variable(id.clone(), Variant::Scalar(ScalarValue::Int32(7)));
        let request = ReadRequest {
            header: RequestHeader::dummy(Utc::now()),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId { node_id: id, attribute_id: AttributeId::BrowseName.as_wire(), index_range: String::new() }],
        };
        let response = handle_read(&space, &request);
        assert_eq!(response.results[0].status, StatusCode::Ok);
        assert_eq!(response.results[0].source_timestamp, None);
        assert!(response.results[0].server_timestamp.is_some());
    }

    #[test]
    fn negative_max_age_faults_whole_request() {
        let space = AddressSpace::new();
        space.configure([]).unwrap();
        let request = ReadRequest {
            header: RequestHeader::dummy(Utc::now()),
            max_age: -1.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId {
                node_id: NodeId::null(),
                attribute_id: AttributeId::Value.as_wire(),
                index_range: String::new(),
            }],
        };
        let response = handle_read(&space, &request);
        assert_eq!(response.header.service_result, StatusCode::BadMaxAgeInvalid);
        assert!(response.results.is_empty());
    }

    #[test]
    fn too_many_operations_faults_whole_request() {
        let space = AddressSpace::new();
        space.configure([]).unwrap();
        let items = vec![
            ReadValueId { node_id: NodeId::null(), attribute_id: AttributeId::Value.as_wire(), index_range: String::new() };
            (MAX_OPERATIONS_PER_MESSAGE + 1) as usize
        ];
        let request = ReadRequest {
            header: RequestHeader::dummy(Utc::now()),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: items,
        };
        let response = handle_read(&space, &request);
        assert_eq!(response.header.service_result, StatusCode::BadTooManyOperations);
    }

    #[test]
    fn reading_value_on_non_variable_node_is_bad_attribute_id_invalid() {
        let id = NodeId::numeric(1, 2);
        let space = AddressSpace::new();
        space
            .configure([Node::Object(NodeHeader {
                node_id: id.clone(),
                node_class: NodeClass::Object,
                browse_name: QualifiedName::new(1, "O"),
                display_name: LocalizedText::new("en", "O"),
                description: None,
                references: Vec::new(),
            })])
            .unwrap();
        let request = ReadRequest {
            header: RequestHeader::dummy(Utc::now()),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId { node_id: id, attribute_id: AttributeId::Value.as_wire(), index_range: String::new() }],
        };
        let response = handle_read(&space, &request);
        assert_eq!(response.results[0].status, StatusCode::BadAttributeIdInvalid);
    }
}
