//! Pizza Core - Shared domain types.
//!
//! This crate provides the types shared by every pizza service component:
//! - `service` - JSON HTTP backend (auth, franchises, menu, orders)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is gated behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, prices, and role assignments

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
