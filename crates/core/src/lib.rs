//! Till Core - Shared domain types for the point-of-sale client.
//!
//! This crate provides the types used across all Till components:
//! - `register` - Cart & catalog controller, backend client and push subscriber
//! - `integration-tests` - End-to-end tests against fake servers
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart arithmetic - no I/O, no
//! HTTP clients, no sockets. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, payment methods, products, the cart and push payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
