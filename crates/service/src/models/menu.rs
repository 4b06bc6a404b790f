//! Menu catalog types.

use serde::{Deserialize, Serialize};

use pizza_core::{MenuItemId, Price};

/// A globally visible menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub title: String,
    pub description: String,
    /// Image reference (file name or URL).
    pub image: String,
    pub price: Price,
}

/// Request body for adding a menu item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMenuItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub price: Price,
}
