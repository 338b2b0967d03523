//! Message registry for the OPC UA service dispatch core (§4.B).
//!
//! # Modules
//!
//! - [`messages`]: per-service request/response bodies and their headers.
//! - [`registry`]: wire type-id dispatch table (`type_id_of`/`classify`)
//!   and the `RequestBody`/`ResponseBody` envelope enums.

pub mod messages;
pub mod registry;

pub use messages::*;
pub use registry::{classify, type_id_of_request, type_id_of_response, MessageClass, RequestBody, ResponseBody, ServiceKind};
