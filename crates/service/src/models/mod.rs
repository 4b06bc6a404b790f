//! Domain models.
//!
//! These are validated domain objects, separate from database row types.
//! Their serde shapes are the JSON bodies returned to clients.

pub mod franchise;
pub mod menu;
pub mod order;
pub mod user;

pub use franchise::{Franchise, FranchiseAdmin, FranchisePage, Store};
pub use menu::{MenuItem, NewMenuItem};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderPage};
pub use user::{NewUser, User, UserUpdate};
