//! ua-serviced - OPC UA service dispatch core daemon.
//!
//! This crate provides:
//! - The typed in-memory address space and its attribute/reference reads
//! - Request decoders and response builders for every service in §2
//! - Per-service handlers (Read, Write, Browse/BrowseNext, Call,
//!   GetEndpoints, CreateSession/ActivateSession/CloseSession)
//! - The subscription engine (monitored items, the publish cycle,
//!   acknowledgements, republish)
//! - The single-threaded cooperative event dispatcher tying it all together

pub mod address_space;
pub mod config;
pub mod decode;
pub mod discovery_queue;
pub mod encode;
pub mod event;
pub mod handlers;
pub mod server;
pub mod session;
pub mod subscriptions;

pub use address_space::AddressSpace;
pub use config::{ClientConfig, ServerConfig};
pub use server::{Server, ServerCore, ServerError};
pub use session::SessionManager;
pub use subscriptions::SubscriptionEngine;
