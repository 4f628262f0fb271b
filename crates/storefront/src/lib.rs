//! Little Sprout storefront library.
//!
//! Cart session management for the baby-clothing storefront: the anonymous
//! device cart, the signed-in user's server cart, the reconciliation between
//! them on sign-in and sign-out, and the totals shown at checkout. The
//! binary in `main.rs` serves it over a small JSON API.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod stores;
