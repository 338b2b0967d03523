//! Browse handler (§4.F "Browse").

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use ua_core::StatusCode;
use ua_proto::{BrowseDirection, BrowseRequest, BrowseResponse, ReferenceDescription, ResponseHeader};

use crate::address_space::AddressSpace;
use crate::decode::decode_browse;
use crate::encode::{localized_text_indet, qualified_name_indet, BrowseResultBuilder};

pub const MAX_OPERATIONS_PER_MESSAGE: u32 = 1000;

/// Opaque continuation-point storage (§4.C): `Browse` stashes the
/// references it couldn't fit in one response under a fresh token;
/// `BrowseNext` redeems the token for the remainder.
pub struct ContinuationPointStore {
    entries: RwLock<HashMap<u32, Vec<ReferenceDescription>>>,
    next_token: AtomicU32,
}

impl ContinuationPointStore {
    pub fn new() -> Self {
        ContinuationPointStore { entries: RwLock::new(HashMap::new()), next_token: AtomicU32::new(1) }
    }

    pub(crate) fn store(&self, remainder: Vec<ReferenceDescription>) -> Vec<u8> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(token, remainder);
        token.to_be_bytes().to_vec()
    }

    /// Redeem and remove a continuation point. `None` means the token was
    /// unknown (already consumed, released, or never issued).
    pub fn take(&self, continuation_point: &[u8]) -> Option<Vec<ReferenceDescription>> {
        let token = u32::from_be_bytes(continuation_point.try_into().ok()?);
        self.entries.write().remove(&token)
    }

    pub fn release(&self, continuation_point: &[u8]) {
        if let Ok(bytes) = continuation_point.try_into() {
            self.entries.write().remove(&u32::from_be_bytes(bytes));
        }
    }
}

impl Default for ContinuationPointStore {
    fn default() -> Self {
        ContinuationPointStore::new()
    }
}

pub fn handle_browse(address_space: &AddressSpace, continuation_point_store: &ContinuationPointStore, request: &BrowseRequest) -> BrowseResponse {
    let now = Utc::now();
    let decoded = match decode_browse(request, MAX_OPERATIONS_PER_MESSAGE) {
        Ok(decoded) => decoded,
        Err(err) => {
            return BrowseResponse { header: ResponseHeader::fault(&request.header, now, err.into()), results: Vec::new() }
        }
    };

    let mut builder = BrowseResultBuilder::new(decoded.items.len());
    let mut issued_continuation_points = Vec::with_capacity(decoded.items.len());

    for item in decoded.items {
        let Ok(references) = address_space.iterate_references(item.node_id) else {
            builder.start_row(StatusCode::BadNodeIdUnknown, 0);
            issued_continuation_points.push(Vec::new());
            continue;
        };

        let matching: Vec<_> = references
            .into_iter()
            .filter(|r| direction_matches(item.direction, r.is_inverse))
            .filter(|r| reference_type_matches(address_space, item.reference_type_filter, item.include_subtypes, &r.reference_type))
            .collect();

        let resolved: Vec<ReferenceDescription> = matching
            .iter()
            .map(|reference| {
                let (browse_name, display_name, node_class, type_definition) = match reference.target.as_local() {
                    Some(local) => match address_space.read(local) {
                        Some(node) => (
                            Some(node.header().browse_name.clone()),
                            Some(node.header().display_name.clone()),
                            Some(node.node_class()),
                            address_space.type_definition_of(local).ok().flatten(),
                        ),
                        None => (None, None, None, None),
                    },
                    None => (None, None, None, None),
                };
                ReferenceDescription {
                    reference_type_id: reference.reference_type.clone(),
                    is_forward: !reference.is_inverse,
                    target_node_id: reference.target.clone(),
                    browse_name: browse_name.or_else(|| Some(qualified_name_indet())),
                    display_name: display_name.or_else(|| Some(localized_text_indet())),
                    node_class,
                    type_definition,
                }
            })
            .collect();

        let cap = decoded.requested_max_references_per_node as usize;
        let (emitted, remainder) = if resolved.len() > cap { resolved.split_at(cap) } else { (&resolved[..], &[][..]) };

        builder.start_row(StatusCode::Ok, emitted.len());
        for reference in emitted {
            builder.push_reference(reference.clone());
        }

        issued_continuation_points.push(if remainder.is_empty() {
            Vec::new()
        } else {
            continuation_point_store.store(remainder.to_vec())
        });
    }

    builder.finalize(ResponseHeader::ok(&request.header, now), issued_continuation_points)
}

fn direction_matches(requested: BrowseDirection, is_inverse: bool) -> bool {
    match requested {
        BrowseDirection::Forward => !is_inverse,
        BrowseDirection::Inverse => is_inverse,
        BrowseDirection::Both => true,
    }
}

fn reference_type_matches(
    address_space: &AddressSpace,
    filter: Option<&ua_core::NodeId>,
    include_subtypes: bool,
    candidate: &ua_core::NodeId,
) -> bool {
    match filter {
        None => true,
        Some(filter) if filter == candidate => true,
        Some(filter) if include_subtypes => address_space.is_transitive_subtype_of(candidate, filter),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_core::{AccessLevel, LocalizedText, Node, NodeClass, NodeHeader, NodeId, QualifiedName, Reference, VariableData, Variant};
    use ua_proto::{BrowseDescription, RequestHeader};

    fn leaf_node(id: NodeId) -> Node {
        Node::Variable(
            NodeHeader {
                node_id: id,
                node_class: NodeClass::Variable,
                browse_name: QualifiedName::new(1, "Leaf"),
                display_name: LocalizedText::new("en", "Leaf"),
                description: None,
                references: Vec::new(),
            },
            VariableData {
                value: Variant::Null,
                data_type: NodeId::numeric(0, 6),
                value_rank: -1,
                access_level: AccessLevel::READ_ONLY,
                value_status: StatusCode::Ok,
            },
        )
    }

    #[test]
    fn browse_leaf_node_with_no_references_returns_empty_ok_result() {
        let id = NodeId::numeric(1, 1);
        let space = AddressSpace::new();
        space.configure([leaf_node(id.clone())]).unwrap();
        let request = BrowseRequest {
            header: RequestHeader::dummy(Utc::now()),
            requested_max_references_per_node: 10,
            nodes_to_browse: vec![BrowseDescription {
                node_id: id,
                browse_direction: BrowseDirection::Forward,
                reference_type_id: None,
                include_subtypes: false,
            }],
        };
        let response = handle_browse(&space, &ContinuationPointStore::new(), &request);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].status, StatusCode::Ok);
        assert!(response.results[0].references.is_empty());
        assert!(response.results[0].continuation_point.is_empty());
    }

    #[test]
    fn browse_unknown_node_returns_bad_node_id_unknown() {
        let space = AddressSpace::new();
        space.configure([]).unwrap();
        let request = BrowseRequest {
            header: RequestHeader::dummy(Utc::now()),
            requested_max_references_per_node: 10,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::numeric(2, 999),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: None,
                include_subtypes: false,
            }],
        };
        let response = handle_browse(&space, &ContinuationPointStore::new(), &request);
        assert_eq!(response.results[0].status, StatusCode::BadNodeIdUnknown);
    }

    #[test]
    fn browse_emits_continuation_point_when_references_exceed_requested_max() {
        let parent_id = NodeId::numeric(1, 1);
        let mut parent = leaf_node(parent_id.clone());
        if let Node::Variable(header, _) = &mut parent {
            for i in 0..3u32 {
                header.references.push(Reference {
                    reference_type: NodeId::numeric(0, 47),
                    is_inverse: false,
                    target: NodeId::numeric(1, 100 + i).into(),
                });
            }
        }
        let space = AddressSpace::new();
        space.configure([parent]).unwrap();
        let request = BrowseRequest {
            header: RequestHeader::dummy(Utc::now()),
            requested_max_references_per_node: 2,
            nodes_to_browse: vec![BrowseDescription {
                node_id: parent_id,
                browse_direction: BrowseDirection::Forward,
                reference_type_id: None,
                include_subtypes: false,
            }],
        };
        let response = handle_browse(&space, &ContinuationPointStore::new(), &request);
        assert_eq!(response.results[0].references.len(), 2);
        assert!(!response.results[0].continuation_point.is_empty());
    }

    #[test]
    fn continuation_point_store_redeems_exactly_once() {
        let store = ContinuationPointStore::new();
        let token = store.store(vec![]);
        assert!(store.take(&token).is_some());
        assert!(store.take(&token).is_none());
    }
}
