//! Provider implementations for sandgate.
//!
//! The HTTP gateway and the sqlite store implement the traits defined in
//! `sandgate-core`; the factory builds them from an [`AppConfig`]
//! (`sandgate_core::api::AppConfig`).

pub mod factory;
pub mod gateway;
pub mod store;
