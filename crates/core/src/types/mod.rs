//! Core types for Little Sprout.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;

pub use cart::*;
pub use id::{CartItemId, CategoryId, LineIdError, ProductId, UserId};
pub use price::Money;
pub use product::{Category, Product};
