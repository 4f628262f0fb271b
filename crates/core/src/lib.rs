//! Little Sprout Core - Shared types library.
//!
//! This crate provides the domain types used across all Little Sprout components:
//! - `storefront` - Cart session service and catalog access
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, catalog records, carts and pricing policy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
