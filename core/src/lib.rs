//! Domain core for the sandgate submission service.
//!
//! Everything here is transport- and storage-agnostic: the session engine
//! talks to the scanning service and the durable store exclusively through
//! the traits in [`gateway`], [`ledger`] and [`operators`]. Concrete
//! providers live in the `sandgate-plugins` crate.

pub mod api;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod ledger;
pub mod operators;
pub mod poll;
pub mod session;
