//! Service Handlers (§4.F): the per-item execution loops that tie the
//! decoders (`decode.rs`), the address space, and the response builders
//! (`encode.rs`) together.
//!
//! One file per service, grounded on
//! `original_source/csrc/services/b2c/util_b2c.c` (status mapping) and on
//! the teacher's per-module `thiserror` + `#[cfg(test)]` layout
//! (`membership.rs`).

pub mod browse;
pub mod browse_next;
pub mod call;
pub mod get_endpoints;
pub mod read;
pub mod write;

pub use browse::{handle_browse, ContinuationPointStore};
pub use browse_next::handle_browse_next;
pub use call::handle_call;
pub use get_endpoints::handle_get_endpoints;
pub use read::handle_read;
pub use write::handle_write;
