//! Address Space (§4.C): a typed graph of nodes, mutated only from the
//! service task and read far more often than written.
//!
//! Grounded on `Storage`'s "one map per logical collection" shape
//! (`storage.rs`, removed from the final tree — see `DESIGN.md`) and on the
//! `async-opcua` core node manager's `validate_node_read`/`read_node_value`
//! split. Unlike `Storage`, nothing here is persisted to disk: the address
//! space is configured once at startup from a loaded node set and lives
//! entirely in memory for the lifetime of the process, so a
//! `parking_lot::RwLock<HashMap<NodeId, Node>>` replaces `Storage`'s `sled`
//! trees — the same guard type the teacher already uses in
//! `membership.rs`/`sync.rs`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use ua_core::{
    AccessLevel, AttributeId, DataValue, ExpandedNodeId, Node, NodeClass, NodeId, NumericRange,
    NumericRangeParseError, QualifiedName, ScalarValue, StatusCode, Variant,
};

/// The NS0 numeric id for the `HasTypeDefinition` reference type. Resolves
/// the Open Question in spec.md §9: the published OPC UA catalogue value is
/// `40`, not the `61` seen in one source comment (see `DESIGN.md`).
pub const HAS_TYPE_DEFINITION: u32 = 40;
/// The NS0 numeric id for the `HasSubtype` reference type, used by
/// `is_transitive_subtype_of`.
pub const HAS_SUBTYPE: u32 = 45;

/// Recursion bound shared by `is_transitive_subtype_of` and nested-variant
/// traversal, per §6 "Constants" and the consistency requirement in §4.C.
pub const RECURSION_LIMIT: u32 = 64;

#[derive(Debug, Error, PartialEq)]
pub enum AddressSpaceError {
    #[error("node not found")]
    NodeIdUnknown,
    #[error("attribute not valid for this node class")]
    AttributeIdInvalid,
    #[error("node is not writable")]
    NotWritable,
    #[error("invalid index range: {0}")]
    IndexRangeInvalid(#[from] NumericRangeParseError),
    #[error("index range does not match the value's shape")]
    IndexRangeNoData,
    #[error("address space already configured")]
    AlreadyConfigured,
}

impl From<&AddressSpaceError> for StatusCode {
    fn from(err: &AddressSpaceError) -> StatusCode {
        match err {
            AddressSpaceError::NodeIdUnknown => StatusCode::BadNodeIdUnknown,
            AddressSpaceError::AttributeIdInvalid => StatusCode::BadAttributeIdInvalid,
            AddressSpaceError::NotWritable => StatusCode::BadNotWritable,
            AddressSpaceError::IndexRangeInvalid(_) => StatusCode::BadIndexRangeInvalid,
            AddressSpaceError::IndexRangeNoData => StatusCode::BadIndexRangeNoData,
            AddressSpaceError::AlreadyConfigured => StatusCode::BadInvalidArgument,
        }
    }
}

/// The server's node graph. `configured` is a process-wide flag that
/// transitions once from `false` to `true` and may not be reversed (§3).
pub struct AddressSpace {
    nodes: RwLock<HashMap<NodeId, Node>>,
    configured: AtomicBool,
}

impl AddressSpace {
    pub fn new() -> Self {
        AddressSpace { nodes: RwLock::new(HashMap::new()), configured: AtomicBool::new(false) }
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Populate the address space from an already-parsed node set (the
    /// in-scope counterpart of the out-of-scope XML UANodeSet loader — see
    /// `trait AddressSpaceLoader` in `SPEC_FULL.md` §6). May only be called
    /// once.
    pub fn configure(&self, nodes: impl IntoIterator<Item = Node>) -> Result<(), AddressSpaceError> {
        if self.configured.swap(true, Ordering::AcqRel) {
            return Err(AddressSpaceError::AlreadyConfigured);
        }
        let mut guard = self.nodes.write();
        for node in nodes {
            guard.insert(node.node_id().clone(), node);
        }
        Ok(())
    }

    /// O(1) average lookup (§4.C).
    pub fn read(&self, node_id: &NodeId) -> Option<Node> {
        self.nodes.read().get(node_id).cloned()
    }

    fn with_node<T>(&self, node_id: &NodeId, f: impl FnOnce(&Node) -> T) -> Result<T, AddressSpaceError> {
        let guard = self.nodes.read();
        let node = guard.get(node_id).ok_or(AddressSpaceError::NodeIdUnknown)?;
        Ok(f(node))
    }

    /// `read_attribute(node, attribute_id, index_range?) -> (status, Variant)`
    /// (§4.C). Returns an owned, newly allocated `Variant`.
    pub fn read_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: AttributeId,
        index_range: Option<&str>,
    ) -> Result<Variant, AddressSpaceError> {
        self.with_node(node_id, |node| {
            let raw = match attribute_id {
                AttributeId::NodeId => Variant::Scalar(ScalarValue::NodeId(node.node_id().clone())),
                AttributeId::NodeClass => Variant::Scalar(ScalarValue::Int32(node_class_as_i32(node.node_class()))),
                AttributeId::BrowseName => {
                    Variant::Scalar(ScalarValue::QualifiedName(node.header().browse_name.clone()))
                }
                AttributeId::DisplayName => {
                    Variant::Scalar(ScalarValue::LocalizedText(node.header().display_name.clone()))
                }
                AttributeId::Description => match &node.header().description {
                    Some(text) => Variant::Scalar(ScalarValue::LocalizedText(text.clone())),
                    None => Variant::Null,
                },
                AttributeId::Value => {
                    let data = node.variable_data().ok_or(AddressSpaceError::AttributeIdInvalid)?;
                    data.value.clone()
                }
                AttributeId::DataType => {
                    let data = node.variable_data().ok_or(AddressSpaceError::AttributeIdInvalid)?;
                    Variant::Scalar(ScalarValue::NodeId(data.data_type.clone()))
                }
                AttributeId::ValueRank => {
                    let data = node.variable_data().ok_or(AddressSpaceError::AttributeIdInvalid)?;
                    Variant::Scalar(ScalarValue::Int32(data.value_rank))
                }
                AttributeId::AccessLevel => {
                    let data = node.variable_data().ok_or(AddressSpaceError::AttributeIdInvalid)?;
                    Variant::Scalar(ScalarValue::Byte(data.access_level.0))
                }
                AttributeId::Executable => match node {
                    Node::Method { executable, .. } => Variant::Scalar(ScalarValue::Boolean(*executable)),
                    _ => return Err(AddressSpaceError::AttributeIdInvalid),
                },
            };
            match index_range {
                None | Some("") => Ok(raw),
                Some(range_text) => apply_get_range(&raw, &NumericRange::parse(range_text)?),
            }
        })?
    }

    /// `write_value_full(node, new_value) -> (status, previous_value)`
    /// (§4.C). Returns the previous value for the subscription-engine
    /// data-change hook.
    pub fn write_value_full(&self, node_id: &NodeId, new_value: DataValue) -> Result<DataValue, AddressSpaceError> {
        let mut guard = self.nodes.write();
        let node = guard.get_mut(node_id).ok_or(AddressSpaceError::NodeIdUnknown)?;
        let data = node.variable_data_mut().ok_or(AddressSpaceError::AttributeIdInvalid)?;
        if !data.access_level.can_write() {
            return Err(AddressSpaceError::NotWritable);
        }
        let previous = DataValue::new(data.value.clone(), data.value_status);
        data.value = new_value.value;
        data.value_status = StatusCode::Ok;
        Ok(previous)
    }

    /// `write_value_indexed(node, new_value, index_range) -> (status, previous_value)`
    /// (§4.C). Parses `index_range`, then overwrites the selected sub-range
    /// of the current value in place.
    pub fn write_value_indexed(
        &self,
        node_id: &NodeId,
        new_value: Variant,
        index_range: &str,
    ) -> Result<DataValue, AddressSpaceError> {
        let range = NumericRange::parse(index_range)?;
        let mut guard = self.nodes.write();
        let node = guard.get_mut(node_id).ok_or(AddressSpaceError::NodeIdUnknown)?;
        let data = node.variable_data_mut().ok_or(AddressSpaceError::AttributeIdInvalid)?;
        if !data.access_level.can_write() {
            return Err(AddressSpaceError::NotWritable);
        }
        let previous = DataValue::new(data.value.clone(), data.value_status);
        data.value = apply_set_range(&data.value, &range, new_value)?;
        data.value_status = StatusCode::Ok;
        Ok(previous)
    }

    pub fn iterate_references(&self, node_id: &NodeId) -> Result<Vec<ua_core::Reference>, AddressSpaceError> {
        self.with_node(node_id, |node| node.header().references.clone())
    }

    /// `type_definition_of(node) -> ExpandedNodeId?` (§4.C): the first
    /// forward reference whose reference-type is `HasTypeDefinition`.
    pub fn type_definition_of(&self, node_id: &NodeId) -> Result<Option<ExpandedNodeId>, AddressSpaceError> {
        self.with_node(node_id, |node| {
            node.header()
                .references
                .iter()
                .find(|r| !r.is_inverse && is_has_type_definition(&r.reference_type))
                .map(|r| r.target.clone())
        })
    }

    /// `is_transitive_subtype_of(subtype, supertype) -> bool` (§4.C): walks
    /// inverse `HasSubtype` edges until `supertype` is reached, an
    /// out-of-server target is found, or `RECURSION_LIMIT` is exceeded.
    /// Non-local targets are rejected (logged, treated as `false`).
    pub fn is_transitive_subtype_of(&self, subtype: &NodeId, supertype: &NodeId) -> bool {
        if subtype == supertype {
            return true;
        }
        let mut current = subtype.clone();
        for _ in 0..RECURSION_LIMIT {
            let guard = self.nodes.read();
            let Some(node) = guard.get(&current) else { return false };
            let parent = node
                .header()
                .references
                .iter()
                .find(|r| r.is_inverse && is_has_subtype(&r.reference_type));
            let Some(parent) = parent else { return false };
            let Some(local) = parent.target.as_local() else {
                tracing::warn!(target = %parent.target.node_id, "is_transitive_subtype_of: out-of-server target rejected");
                return false;
            };
            if local == supertype {
                return true;
            }
            current = local.clone();
            drop(guard);
        }
        false
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        AddressSpace::new()
    }
}

fn is_has_type_definition(reference_type: &NodeId) -> bool {
    matches!(&reference_type.identifier, ua_core::Identifier::Numeric(n) if *n == HAS_TYPE_DEFINITION)
        && reference_type.namespace_index == 0
}

fn is_has_subtype(reference_type: &NodeId) -> bool {
    matches!(&reference_type.identifier, ua_core::Identifier::Numeric(n) if *n == HAS_SUBTYPE)
        && reference_type.namespace_index == 0
}

fn node_class_as_i32(class: NodeClass) -> i32 {
    match class {
        NodeClass::Object => 1,
        NodeClass::Variable => 2,
        NodeClass::Method => 4,
        NodeClass::ObjectType => 8,
        NodeClass::VariableType => 16,
        NodeClass::ReferenceType => 32,
        NodeClass::DataType => 64,
        NodeClass::View => 128,
    }
}

/// Test whether `range` is structurally valid for `value`'s shape and, if
/// so, extract the selected sub-variant (§3 "range-selection", §4.C).
fn apply_get_range(value: &Variant, range: &NumericRange) -> Result<Variant, AddressSpaceError> {
    match value {
        Variant::Array(items) => {
            if !range.is_single_dimension() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let dim = range.dimensions[0];
            let end = dim.end as usize;
            if dim.start as usize >= items.len() || end >= items.len() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let slice = items[dim.start as usize..=end].to_vec();
            Ok(Variant::Array(slice))
        }
        Variant::Scalar(ScalarValue::String(s)) => {
            if !range.is_single_dimension() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let dim = range.dimensions[0];
            let chars: Vec<char> = s.chars().collect();
            let end = dim.end as usize;
            if dim.start as usize >= chars.len() || end >= chars.len() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let sub: String = chars[dim.start as usize..=end].iter().collect();
            Ok(Variant::Scalar(ScalarValue::String(sub)))
        }
        _ => Err(AddressSpaceError::IndexRangeNoData),
    }
}

/// Overwrite the selected sub-range of `current` with `new_value`,
/// returning the mutated whole (§3 "overwrite a sub-range from another
/// variant").
fn apply_set_range(
    current: &Variant,
    range: &NumericRange,
    new_value: Variant,
) -> Result<Variant, AddressSpaceError> {
    match current {
        Variant::Array(items) => {
            if !range.is_single_dimension() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let Variant::Array(replacement) = new_value else {
                return Err(AddressSpaceError::IndexRangeNoData);
            };
            let dim = range.dimensions[0];
            let end = dim.end as usize;
            if dim.start as usize >= items.len() || end >= items.len() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let span = end - dim.start as usize + 1;
            if replacement.len() != span {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let mut updated = items.clone();
            updated[dim.start as usize..=end].clone_from_slice(&replacement);
            Ok(Variant::Array(updated))
        }
        Variant::Scalar(ScalarValue::String(s)) => {
            if !range.is_single_dimension() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let Variant::Scalar(ScalarValue::String(replacement)) = new_value else {
                return Err(AddressSpaceError::IndexRangeNoData);
            };
            let dim = range.dimensions[0];
            let mut chars: Vec<char> = s.chars().collect();
            let end = dim.end as usize;
            if dim.start as usize >= chars.len() || end >= chars.len() {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            let span = end - dim.start as usize + 1;
            let replacement_chars: Vec<char> = replacement.chars().collect();
            if replacement_chars.len() != span {
                return Err(AddressSpaceError::IndexRangeNoData);
            }
            chars[dim.start as usize..=end].clone_from_slice(&replacement_chars);
            Ok(Variant::Scalar(ScalarValue::String(chars.into_iter().collect())))
        }
        _ => Err(AddressSpaceError::IndexRangeNoData),
    }
}

/// Populate a server's address space from already-parsed nodes, standing in
/// for the out-of-scope XML UANodeSet loader (§6, `SPEC_FULL.md` §1).
pub trait AddressSpaceLoader {
    type Error;

    fn load(&self) -> Result<Vec<Node>, Self::Error>;
}

/// Trivial loader over an in-memory fixture, used by this crate's own
/// tests and by `--address-space <file>` in `config.rs`.
pub struct StaticLoader(pub Vec<Node>);

impl AddressSpaceLoader for StaticLoader {
    type Error = std::convert::Infallible;

    fn load(&self) -> Result<Vec<Node>, Self::Error> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_core::{LocalizedText, NodeHeader, QualifiedName as Qn, VariableData};

    fn variable_node(id: NodeId, value: Variant) -> Node {
        Node::Variable(
            NodeHeader {
                node_id: id,
                node_class: NodeClass::Variable,
                browse_name: Qn::new(1, "Var"),
                display_name: LocalizedText::new("en", "Var"),
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
        )
    }

    #[test]
    fn read_attribute_value_round_trips_type() {
        let space = AddressSpace::new();
        let id = NodeId::numeric(1, 1);
        space.configure([variable_node(id.clone(), Variant::Scalar(ScalarValue::Int32(7)))]).unwrap();
        let value = space.read_attribute(&id, AttributeId::Value, None).unwrap();
        assert_eq!(value, Variant::Scalar(ScalarValue::Int32(7)));
    }

    #[test]
    fn read_attribute_value_on_non_variable_is_invalid() {
        let space = AddressSpace::new();
        let id = NodeId::numeric(1, 2);
        let object = Node::Object(NodeHeader {
            node_id: id.clone(),
            node_class: NodeClass::Object,
            browse_name: Qn::new(1, "Obj"),
            display_name: LocalizedText::new("en", "Obj"),
            description: None,
            references: Vec::new(),
        });
        space.configure([object]).unwrap();
        let err = space.read_attribute(&id, AttributeId::Value, None).unwrap_err();
        assert_eq!(err, AddressSpaceError::AttributeIdInvalid);
    }

    #[test]
    fn read_unknown_node_is_node_id_unknown() {
        let space = AddressSpace::new();
        let err = space.read_attribute(&NodeId::numeric(9, 9), AttributeId::Value, None).unwrap_err();
        assert_eq!(err, AddressSpaceError::NodeIdUnknown);
    }

    #[test]
    fn configure_may_only_run_once() {
        let space = AddressSpace::new();
        space.configure([]).unwrap();
        assert!(space.is_configured());
        assert_eq!(space.configure([]).unwrap_err(), AddressSpaceError::AlreadyConfigured);
    }

    #[test]
    fn write_value_full_returns_previous_value() {
        let space = AddressSpace::new();
        let id = NodeId::numeric(1, 3);
        space.configure([variable_node(id.clone(), Variant::Scalar(ScalarValue::Int32(7)))]).unwrap();
        let previous = space
            .write_value_full(&id, DataValue::new(Variant::Scalar(ScalarValue::Int32(42)), StatusCode::Ok))
            .unwrap();
        assert_eq!(previous.value, Variant::Scalar(ScalarValue::Int32(7)));
        let now = space.read_attribute(&id, AttributeId::Value, None).unwrap();
        assert_eq!(now, Variant::Scalar(ScalarValue::Int32(42)));
    }

    #[test]
    fn write_value_full_denied_when_not_writable() {
        let space = AddressSpace::new();
        let id = NodeId::numeric(1, 4);
        let mut node = variable_node(id.clone(), Variant::Scalar(ScalarValue::Int32(7)));
        if let Node::Variable(_, data) = &mut node {
            data.access_level = AccessLevel::READ_ONLY;
        }
        space.configure([node]).unwrap();
        let err = space
            .write_value_full(&id, DataValue::new(Variant::Scalar(ScalarValue::Int32(1)), StatusCode::Ok))
            .unwrap_err();
        assert_eq!(err, AddressSpaceError::NotWritable);
    }

    #[test]
    fn get_range_extracts_string_slice() {
        let value = Variant::Scalar(ScalarValue::String("hello".into()));
        let range = NumericRange::parse("1:3").unwrap();
        assert_eq!(apply_get_range(&value, &range).unwrap(), Variant::Scalar(ScalarValue::String("ell".into())));
    }

    #[test]
    fn set_range_mutates_string_in_place() {
        let value = Variant::Scalar(ScalarValue::String("hello".into()));
        let range = NumericRange::parse("1:3").unwrap();
        let replacement = Variant::Scalar(ScalarValue::String("XYZ".into()));
        let mutated = apply_set_range(&value, &range, replacement).unwrap();
        assert_eq!(mutated, Variant::Scalar(ScalarValue::String("hXYZo".into())));
    }

    #[test]
    fn is_transitive_subtype_of_reflexive() {
        let space = AddressSpace::new();
        let id = NodeId::numeric(0, 58);
        let node = Node::DataType(NodeHeader {
            node_id: id.clone(),
            node_class: NodeClass::DataType,
            browse_name: Qn::new(0, "BaseDataType"),
            display_name: LocalizedText::new("en", "BaseDataType"),
            description: None,
            references: Vec::new(),
        });
        space.configure([node]).unwrap();
        assert!(space.is_transitive_subtype_of(&id, &id));
    }

    #[test]
    fn is_transitive_subtype_of_walks_has_subtype_chain() {
        let space = AddressSpace::new();
        let base = NodeId::numeric(0, 1);
        let child = NodeId::numeric(0, 2);
        let base_node = Node::DataType(NodeHeader {
            node_id: base.clone(),
            node_class: NodeClass::DataType,
            browse_name: Qn::new(0, "Base"),
            display_name: LocalizedText::new("en", "Base"),
            description: None,
            references: Vec::new(),
        });
        let child_node = Node::DataType(NodeHeader {
            node_id: child.clone(),
            node_class: NodeClass::DataType,
            browse_name: Qn::new(0, "Child"),
            display_name: LocalizedText::new("en", "Child"),
            description: None,
            references: vec![ua_core::Reference {
                reference_type: NodeId::numeric(0, HAS_SUBTYPE),
                is_inverse: true,
                target: base.clone().into(),
            }],
        });
        space.configure([base_node, child_node]).unwrap();
        assert!(space.is_transitive_subtype_of(&child, &base));
        assert!(!space.is_transitive_subtype_of(&base, &child));
    }
}
