//! Response Builders (§4.E): per-service encoders that allocate result
//! arrays and fill them position-wise, then transfer ownership into the
//! response message.
//!
//! Like `decode.rs`, this has no direct teacher analogue; grounded on
//! `original_source/csrc/services/b2c/msg_*_response_bs.c`'s
//! allocate-then-fill-by-index shape, translated into builders that grow a
//! `Vec` under a capacity bound rather than pre-allocating a C array. The
//! Browse builder's 2D buffer becomes a `Vec<Vec<ReferenceDescription>>`
//! indexed the same way (`[bvi][bri]`).

use chrono::{DateTime, Utc};
use ua_core::{AttributeId, DataValue, LocalizedText, NodeClass, QualifiedName, StatusCode};
use ua_proto::{
    BrowseResult, BrowseResponse, CallMethodResult, CallResponse, MonitoredItemCreateResult,
    CreateMonitoredItemsResponse, ReadResponse, ReferenceDescription, ResponseHeader, TimestampsToReturn,
    WriteResponse,
};

/// `allocate(N) -> bool` (§4.E): result arrays are bounded by
/// `max_operations`; exceeding it is a builder misuse (a decoder bug, since
/// decoders already enforce the bound) and panics rather than returning
/// `BadOutOfMemory` — Rust's `Vec` cannot fail an in-process allocation the
/// way the source's fixed arena could.
pub fn allocate<T>(n: usize, max_operations: u32) -> Vec<T> {
    assert!(n as u64 <= max_operations as u64, "allocate: N exceeds MaxOperationsPerMessage");
    Vec::with_capacity(n)
}

/// Read builder: fills `DataValue`s, stamping timestamps according to
/// `TimestampsToReturn` (§4.E).
pub struct ReadResultBuilder {
    results: Vec<DataValue>,
    timestamps_to_return: TimestampsToReturn,
    now: DateTime<Utc>,
}

impl ReadResultBuilder {
    pub fn new(capacity: usize, timestamps_to_return: TimestampsToReturn, now: DateTime<Utc>) -> Self {
        ReadResultBuilder { results: Vec::with_capacity(capacity), timestamps_to_return, now }
    }

    /// `set_item(i, fields...)`. Read results are appended in order, so
    /// `i` is implicit (the Read builder has no out-of-order slots, unlike
    /// Browse). `SourceTimestamp` is only meaningful for the `Value`
    /// attribute (`msg_read_response_bs__set_read_response`); every other
    /// attribute only ever gets `ServerTimestamp`.
    pub fn push(&mut self, attribute_id: AttributeId, mut value: DataValue) {
        use TimestampsToReturn::*;
        match self.timestamps_to_return {
            Source | Both if attribute_id == AttributeId::Value => value.source_timestamp = Some(self.now),
            _ => {}
        }
        match self.timestamps_to_return {
            Server | Both => value.server_timestamp = Some(self.now),
            Source | Neither => {}
        }
        self.results.push(value);
    }

    pub fn finalize(self, header: ResponseHeader) -> ReadResponse {
        ReadResponse { header, results: self.results }
    }
}

/// Write builder: a flat `StatusCode` per item, in arrival order.
pub struct WriteResultBuilder {
    results: Vec<StatusCode>,
}

impl WriteResultBuilder {
    pub fn new(capacity: usize) -> Self {
        WriteResultBuilder { results: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, status: StatusCode) {
        self.results.push(status);
    }

    pub fn finalize(self, header: ResponseHeader) -> WriteResponse {
        WriteResponse { header, results: self.results }
    }
}

/// Browse builder: tracks the 2D `[bvi][bri]` buffer of reference
/// descriptions plus a per-BrowseValue capacity and live count (§4.E).
pub struct BrowseResultBuilder {
    rows: Vec<BrowseRow>,
}

struct BrowseRow {
    status: StatusCode,
    capacity: usize,
    references: Vec<ReferenceDescription>,
}

impl BrowseResultBuilder {
    pub fn new(capacity: usize) -> Self {
        BrowseResultBuilder { rows: Vec::with_capacity(capacity) }
    }

    /// Start a new BrowseValue row (`bvi`) with its per-row reference
    /// capacity (`pnAllocReferenceDescription`).
    pub fn start_row(&mut self, status: StatusCode, reference_capacity: usize) {
        self.rows.push(BrowseRow { status, capacity: reference_capacity, references: Vec::new() });
    }

    /// Write reference slot `bri` of the current row. Requires slots
    /// `0..bri` already filled in-order, enforced here by always appending
    /// (§4.E "requires slots 1..i-1 to already be filled in-order").
    pub fn push_reference(&mut self, reference: ReferenceDescription) {
        let row = self.rows.last_mut().expect("push_reference called before start_row");
        assert!(row.references.len() < row.capacity, "push_reference: row at capacity");
        row.references.push(reference);
    }

    /// `free_browse_result()`: safely re-entrant drop of all half-built
    /// rows. Rust's ownership makes this the default `Drop` behaviour; the
    /// method exists to document the contract explicitly.
    pub fn discard(self) {
        drop(self);
    }

    pub fn finalize(self, header: ResponseHeader, continuation_points: Vec<Vec<u8>>) -> BrowseResponse {
        let results = self
            .rows
            .into_iter()
            .zip(continuation_points.into_iter().chain(std::iter::repeat(Vec::new())))
            .map(|(row, cp)| BrowseResult { status: row.status, continuation_point: cp, references: row.references })
            .collect();
        BrowseResponse { header, results }
    }
}

/// The sentinel rendering of optional Browse fields the builder emits when
/// a target does not resolve locally (§4.E).
pub fn qualified_name_indet() -> QualifiedName {
    QualifiedName::default()
}

pub fn localized_text_indet() -> LocalizedText {
    LocalizedText::default()
}

pub const NODE_CLASS_UNSPECIFIED: Option<NodeClass> = None;

/// CreateMonitoredItems builder: a flat per-item result, in arrival order.
pub struct MonitoredItemsResultBuilder {
    results: Vec<MonitoredItemCreateResult>,
}

impl MonitoredItemsResultBuilder {
    pub fn new(capacity: usize) -> Self {
        MonitoredItemsResultBuilder { results: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, result: MonitoredItemCreateResult) {
        self.results.push(result);
    }

    pub fn finalize(self, header: ResponseHeader) -> CreateMonitoredItemsResponse {
        CreateMonitoredItemsResponse { header, results: self.results }
    }
}

/// Call builder: a flat per-item result, in arrival order.
pub struct CallResultBuilder {
    results: Vec<CallMethodResult>,
}

impl CallResultBuilder {
    pub fn new(capacity: usize) -> Self {
        CallResultBuilder { results: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, result: CallMethodResult) {
        self.results.push(result);
    }

    pub fn finalize(self, header: ResponseHeader) -> CallResponse {
        CallResponse { header, results: self.results }
    }
}
