//! Core types for Till.
//!
//! This module provides type-safe wrappers for the point-of-sale domain.

pub mod cart;
pub mod events;
pub mod id;
pub mod payment;
pub mod price;
pub mod product;

pub use cart::{Cart, CartItem};
pub use events::{LowStockAlert, StockUpdate};
pub use id::*;
pub use payment::{PaymentMethod, PaymentMethodError};
pub use price::Price;
pub use product::Product;
