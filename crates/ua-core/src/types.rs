//! Core data model types (§3): identifiers, the dynamically typed `Variant`,
//! numeric ranges, timestamped values, and the address-space node shapes
//! built on top of them.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::StatusCode;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// 128-bit GUID, decomposed the OPC UA way so textual (`g=...`) rendering
/// and log output don't have to reassemble a `u128`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{}-{}",
            self.data1,
            self.data2,
            self.data3,
            hex::encode(&self.data4[..2]),
            hex::encode(&self.data4[2..]),
        )
    }
}

/// The identifier payload of a `NodeId`, tagged by which of the four OPC UA
/// identifier kinds it carries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Guid),
    ByteString(Vec<u8>),
}

/// A namespace-qualified identifier for an address-space node. Equality and
/// hashing compare namespace and identifier payload, making `NodeId` usable
/// directly as a map key (§3 "a canonical hash is defined for use as a map
/// key").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace_index: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn numeric(namespace_index: u16, id: u32) -> Self {
        NodeId { namespace_index, identifier: Identifier::Numeric(id) }
    }

    pub fn string(namespace_index: u16, id: impl Into<String>) -> Self {
        NodeId { namespace_index, identifier: Identifier::String(id.into()) }
    }

    /// The null NodeId: `(ns=0, Numeric=0)`.
    pub fn null() -> Self {
        NodeId::numeric(0, 0)
    }

    pub fn is_null(&self) -> bool {
        *self == NodeId::null()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "ns={};i={}", self.namespace_index, n),
            Identifier::String(s) => write!(f, "ns={};s={}", self.namespace_index, s),
            Identifier::Guid(g) => write!(f, "ns={};g={}", self.namespace_index, g),
            Identifier::ByteString(b) => {
                write!(f, "ns={};b={}", self.namespace_index, hex::encode(b))
            }
        }
    }
}

/// A `NodeId` plus an optional out-of-server qualifier (§3). A NodeId
/// embedded here denotes "this server" iff `server_index == 0` and
/// `namespace_uri` is empty, matching the Open Question resolution in
/// `DESIGN.md` for converting back to a plain `NodeId`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: String,
    pub server_index: u32,
}

impl ExpandedNodeId {
    pub fn local(node_id: NodeId) -> Self {
        ExpandedNodeId { node_id, namespace_uri: String::new(), server_index: 0 }
    }

    /// `true` iff this identifies a node on this server, i.e. the embedded
    /// NodeId can be used directly.
    pub fn is_local(&self) -> bool {
        self.server_index == 0 && self.namespace_uri.is_empty()
    }

    /// The embedded NodeId, if this reference is local (see
    /// `local_node_id` in the Open Question resolutions of `DESIGN.md`).
    pub fn as_local(&self) -> Option<&NodeId> {
        self.is_local().then_some(&self.node_id)
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId::local(node_id)
    }
}

/// (namespace index, text) — browse names are unique among siblings but not
/// globally.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        QualifiedName { namespace_index, name: name.into() }
    }
}

/// A single (locale, text) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocaleText {
    pub locale: String,
    pub text: String,
}

/// (locale, text) plus additional translations (§3).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalizedText {
    pub locale: String,
    pub text: String,
    pub additional: Vec<LocaleText>,
}

impl LocalizedText {
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        LocalizedText { locale: locale.into(), text: text.into(), additional: Vec::new() }
    }
}

// =============================================================================
// VARIANT / NUMERIC RANGE
// =============================================================================

/// A dynamically typed value (§3). The array-shape discriminant is carried
/// directly by the enum variant rather than as a side flag, following the
/// "tagged polymorphism over ad-hoc unions" design note.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Variant {
    Null,
    Scalar(ScalarValue),
    Array(Vec<ScalarValue>),
    /// Row-major flattened payload plus its shape. Dimensions are recorded
    /// explicitly (resolving the spec's silence on Matrix shape tracking,
    /// per `SPEC_FULL.md` §3) so range application can validate rank before
    /// indexing.
    Matrix { dimensions: Vec<i32>, values: Vec<ScalarValue> },
}

impl Variant {
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// The built-in type id of the payload, or `None` for `Null`. Array and
    /// Matrix variants are assumed homogeneous, as OPC UA requires.
    pub fn builtin_type(&self) -> Option<BuiltinType> {
        match self {
            Variant::Null => None,
            Variant::Scalar(s) => Some(s.builtin_type()),
            Variant::Array(items) => items.first().map(ScalarValue::builtin_type),
            Variant::Matrix { values, .. } => values.first().map(ScalarValue::builtin_type),
        }
    }

    /// Deep copy: for the scalar/enum payloads we use this is identical to
    /// `Clone`, since nothing here is reference-counted.
    pub fn deep_copy(&self) -> Variant {
        self.clone()
    }
}

/// Built-in scalar payloads (§3's enumerated type list).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    ByteString(Vec<u8>),
    XmlElement(String),
    DateTime(DateTime<Utc>),
    Guid(Guid),
    NodeId(NodeId),
    ExpandedNodeId(ExpandedNodeId),
    StatusCode(StatusCode),
    QualifiedName(QualifiedName),
    LocalizedText(LocalizedText),
    DataValue(Box<DataValue>),
}

/// Identifies which [`ScalarValue`] variant a value is without borrowing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinType {
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    ByteString,
    XmlElement,
    DateTime,
    Guid,
    NodeId,
    ExpandedNodeId,
    StatusCode,
    QualifiedName,
    LocalizedText,
    DataValue,
}

impl ScalarValue {
    pub fn builtin_type(&self) -> BuiltinType {
        match self {
            ScalarValue::Boolean(_) => BuiltinType::Boolean,
            ScalarValue::SByte(_) => BuiltinType::SByte,
            ScalarValue::Byte(_) => BuiltinType::Byte,
            ScalarValue::Int16(_) => BuiltinType::Int16,
            ScalarValue::UInt16(_) => BuiltinType::UInt16,
            ScalarValue::Int32(_) => BuiltinType::Int32,
            ScalarValue::UInt32(_) => BuiltinType::UInt32,
            ScalarValue::Int64(_) => BuiltinType::Int64,
            ScalarValue::UInt64(_) => BuiltinType::UInt64,
            ScalarValue::Float(_) => BuiltinType::Float,
            ScalarValue::Double(_) => BuiltinType::Double,
            ScalarValue::String(_) => BuiltinType::String,
            ScalarValue::ByteString(_) => BuiltinType::ByteString,
            ScalarValue::XmlElement(_) => BuiltinType::XmlElement,
            ScalarValue::DateTime(_) => BuiltinType::DateTime,
            ScalarValue::Guid(_) => BuiltinType::Guid,
            ScalarValue::NodeId(_) => BuiltinType::NodeId,
            ScalarValue::ExpandedNodeId(_) => BuiltinType::ExpandedNodeId,
            ScalarValue::StatusCode(_) => BuiltinType::StatusCode,
            ScalarValue::QualifiedName(_) => BuiltinType::QualifiedName,
            ScalarValue::LocalizedText(_) => BuiltinType::LocalizedText,
            ScalarValue::DataValue(_) => BuiltinType::DataValue,
        }
    }
}

/// One inclusive `[start, end]` dimension of a [`NumericRange`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RangeDimension {
    pub start: u32,
    pub end: u32,
}

/// A parsed numeric range: one or more dimensions, each `start <= end`
/// (§3, §6 "Numeric-range syntax").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumericRange {
    pub dimensions: Vec<RangeDimension>,
}

/// Errors from [`NumericRange::parse`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NumericRangeParseError {
    #[error("empty numeric range")]
    Empty,
    #[error("malformed dimension {0:?}")]
    Malformed(String),
    #[error("dimension start {start} > end {end}")]
    StartAfterEnd { start: u32, end: u32 },
    #[error("dimension index out of u32 range: {0}")]
    OutOfRange(String),
}

impl NumericRange {
    /// Parse `d1[,d2[,...]]` where each `dN` is `S` (`start == end == S`) or
    /// `S:E` with `S < E`. An empty string is illegal per §6.
    pub fn parse(text: &str) -> Result<NumericRange, NumericRangeParseError> {
        if text.is_empty() {
            return Err(NumericRangeParseError::Empty);
        }
        let mut dimensions = Vec::new();
        for part in text.split(',') {
            if part.is_empty() {
                return Err(NumericRangeParseError::Malformed(part.to_string()));
            }
            let dim = match part.split_once(':') {
                None => {
                    let value: u32 = part
                        .parse()
                        .map_err(|_| NumericRangeParseError::OutOfRange(part.to_string()))?;
                    RangeDimension { start: value, end: value }
                }
                Some((s, e)) => {
                    let start: u32 = s
                        .parse()
                        .map_err(|_| NumericRangeParseError::OutOfRange(part.to_string()))?;
                    let end: u32 = e
                        .parse()
                        .map_err(|_| NumericRangeParseError::OutOfRange(part.to_string()))?;
                    if start >= end {
                        return Err(NumericRangeParseError::StartAfterEnd { start, end });
                    }
                    RangeDimension { start, end }
                }
            };
            dimensions.push(dim);
        }
        Ok(NumericRange { dimensions })
    }

    /// The canonical `d1[,d2[,...]]` rendering; `parse` is its inverse
    /// (§8 invariant 6).
    pub fn format(&self) -> String {
        self.dimensions
            .iter()
            .map(|d| {
                if d.start == d.end {
                    d.start.to_string()
                } else {
                    format!("{}:{}", d.start, d.end)
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_single_dimension(&self) -> bool {
        self.dimensions.len() == 1
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

// =============================================================================
// DATA VALUE
// =============================================================================

/// Variant + status code + timestamps (§3). Timestamps use
/// `chrono::DateTime<Utc>` for ordered wall-clock comparisons (Publish
/// deadline checks, §4.G); the picosecond refinement is a narrow
/// supplementary field, mirroring the source's paired
/// `sourceTimestamp`/`sourcePicoseconds` fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataValue {
    pub value: Variant,
    pub status: StatusCode,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub source_picoseconds: i16,
    pub server_timestamp: Option<DateTime<Utc>>,
    pub server_picoseconds: i16,
}

impl DataValue {
    pub fn new(value: Variant, status: StatusCode) -> Self {
        DataValue {
            value,
            status,
            source_timestamp: None,
            source_picoseconds: 0,
            server_timestamp: None,
            server_picoseconds: 0,
        }
    }

    pub fn null() -> Self {
        DataValue::new(Variant::Null, StatusCode::BadAttributeIdInvalid)
    }
}

// =============================================================================
// ADDRESS SPACE NODE MODEL
// =============================================================================

/// The OPC UA node class discriminant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
    ObjectType,
    VariableType,
    ReferenceType,
    DataType,
    View,
}

/// A directed, typed edge from a node to a target (§3, glossary).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    pub reference_type: NodeId,
    pub is_inverse: bool,
    pub target: ExpandedNodeId,
}

/// Access-level bitmask for Variable/VariableType nodes, mirroring the
/// wire's `CurrentRead`/`CurrentWrite` bits.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessLevel(pub u8);

impl AccessLevel {
    pub const CURRENT_READ: u8 = 0x01;
    pub const CURRENT_WRITE: u8 = 0x02;
    pub const NONE: AccessLevel = AccessLevel(0);
    pub const READ_WRITE: AccessLevel = AccessLevel(Self::CURRENT_READ | Self::CURRENT_WRITE);
    pub const READ_ONLY: AccessLevel = AccessLevel(Self::CURRENT_READ);

    pub fn can_read(&self) -> bool {
        self.0 & Self::CURRENT_READ != 0
    }

    pub fn can_write(&self) -> bool {
        self.0 & Self::CURRENT_WRITE != 0
    }
}

/// Fields common to every node class.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeHeader {
    pub node_id: NodeId,
    pub node_class: NodeClass,
    pub browse_name: QualifiedName,
    pub display_name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub references: Vec<Reference>,
}

/// Variable/VariableType-specific payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VariableData {
    pub value: Variant,
    pub data_type: NodeId,
    pub value_rank: i32,
    pub access_level: AccessLevel,
    pub value_status: StatusCode,
}

/// A tagged union discriminated by node class (§3), replacing the source's
/// node-class integer plus `memcpy`'d disjoint substructure with a sum type
/// per the "tagged polymorphism" design note.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Node {
    Object(NodeHeader),
    Variable(NodeHeader, VariableData),
    Method { header: NodeHeader, executable: bool },
    ObjectType(NodeHeader),
    VariableType(NodeHeader, VariableData),
    ReferenceType(NodeHeader),
    DataType(NodeHeader),
    View(NodeHeader),
}

impl Node {
    pub fn header(&self) -> &NodeHeader {
        match self {
            Node::Object(h)
            | Node::Variable(h, _)
            | Node::ObjectType(h)
            | Node::VariableType(h, _)
            | Node::ReferenceType(h)
            | Node::DataType(h)
            | Node::View(h) => h,
            Node::Method { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut NodeHeader {
        match self {
            Node::Object(h)
            | Node::Variable(h, _)
            | Node::ObjectType(h)
            | Node::VariableType(h, _)
            | Node::ReferenceType(h)
            | Node::DataType(h)
            | Node::View(h) => h,
            Node::Method { header, .. } => header,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.header().node_id
    }

    pub fn node_class(&self) -> NodeClass {
        self.header().node_class
    }

    pub fn variable_data(&self) -> Option<&VariableData> {
        match self {
            Node::Variable(_, v) | Node::VariableType(_, v) => Some(v),
            _ => None,
        }
    }

    pub fn variable_data_mut(&mut self) -> Option<&mut VariableData> {
        match self {
            Node::Variable(_, v) | Node::VariableType(_, v) => Some(v),
            _ => None,
        }
    }
}

/// Attribute identifiers the service layer reads/writes (§4.C). Not
/// exhaustive of the OPC UA catalogue — only the attributes this core
/// touches.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AttributeId {
    NodeId,
    NodeClass,
    BrowseName,
    DisplayName,
    Description,
    Value,
    DataType,
    ValueRank,
    AccessLevel,
    Executable,
}

impl AttributeId {
    /// Translate the wire attribute id. Unsupported ids return `None`; the
    /// caller maps that to `BadAttributeIdInvalid` (§4.D).
    pub fn from_wire(id: u32) -> Option<AttributeId> {
        Some(match id {
            1 => AttributeId::NodeId,
            2 => AttributeId::NodeClass,
            3 => AttributeId::BrowseName,
            4 => AttributeId::DisplayName,
            6 => AttributeId::Description,
            13 => AttributeId::Value,
            14 => AttributeId::DataType,
            15 => AttributeId::ValueRank,
            17 => AttributeId::AccessLevel,
            12 => AttributeId::Executable,
            _ => return None,
        })
    }

    pub fn as_wire(&self) -> u32 {
        match self {
            AttributeId::NodeId => 1,
            AttributeId::NodeClass => 2,
            AttributeId::BrowseName => 3,
            AttributeId::DisplayName => 4,
            AttributeId::Description => 6,
            AttributeId::Value => 13,
            AttributeId::DataType => 14,
            AttributeId::ValueRank => 15,
            AttributeId::AccessLevel => 17,
            AttributeId::Executable => 12,
        }
    }
}

/// An instance-fixed ordering of (nodeId -> node) used by fixture loaders
/// and tests; the live address space keeps its own lock-guarded map (see
/// `ua_serviced::address_space`), this type exists only so `ua-core`
/// consumers can describe an initial node set without depending on
/// `ua-serviced`.
pub type NodeSet = HashMap<NodeId, Node>;
