//! Till register: cart & catalog controller for a point-of-sale client.
//!
//! This crate provides the register as a library so the terminal binary,
//! tests and other front-ends share the same controller.
//!
//! # Modules
//!
//! - [`backend`] - sales server client (`/stock/...`, `/sales/...`)
//! - [`push`] - Socket.IO stock notifications
//! - [`register`] - the controller owning cart and screen state
//! - [`view`] - declarative rendering of that state
//! - [`terminal`] - line-oriented front-end used by the `till` binary

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod push;
pub mod register;
pub mod terminal;
pub mod view;

pub use config::TillConfig;
pub use error::TillError;
pub use register::{AddOutcome, CheckoutOutcome, Host, Register};
