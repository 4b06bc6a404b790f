//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, bearer tokens
//! - `authz` - Caller identity and capability checks
//! - `franchises` - Franchise and store management
//! - `menu` - Cached menu reads, admin writes
//! - `orders` - Order placement and listing
//!
//! Services borrow their collaborators from `AppState` for the duration of
//! one request and receive the caller's [`authz::Identity`] explicitly.

pub mod auth;
pub mod authz;
pub mod franchises;
pub mod menu;
pub mod orders;
