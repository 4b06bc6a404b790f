//! Menu and order route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{MenuItem, NewMenuItem, OrderPage};
use crate::routes::JsonBody;
use crate::services::menu::MenuService;
use crate::services::orders::{OrderWorkflow, PlaceOrder, PlacedOrder};
use crate::state::AppState;

/// Build the order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/order/menu", get(menu).put(add_menu_item))
        .route("/order", get(list_orders).post(place_order))
}

/// Query parameters for the order listing.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,
}

/// The full menu.
///
/// # Errors
///
/// 500 if the menu cannot be read.
pub async fn menu(State(state): State<AppState>) -> Result<Json<Arc<Vec<MenuItem>>>> {
    let menu = MenuService::new(state.db(), state.menu_cache()).list().await?;
    Ok(Json(menu))
}

/// Add a menu item and return the updated menu.
///
/// # Errors
///
/// 403 `"unable to add menu item"` unless the caller is an admin; 400 for
/// a missing title or a negative price.
pub async fn add_menu_item(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    JsonBody(item): JsonBody<NewMenuItem>,
) -> Result<Json<Arc<Vec<MenuItem>>>> {
    let menu = MenuService::new(state.db(), state.menu_cache())
        .add(&identity, item)
        .await?;
    Ok(Json(menu))
}

/// One page of the caller's orders.
///
/// # Errors
///
/// 401 without a valid token.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderPage>> {
    let workflow = OrderWorkflow::new(state.db(), state.factory(), state.telemetry());
    let page = workflow
        .list_orders(&identity, query.page, state.config().list_per_page)
        .await?;
    Ok(Json(page))
}

/// Place an order for the caller.
///
/// # Errors
///
/// 400/404 for an invalid order; 500 with the factory's report URL if the
/// factory does not accept it.
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    JsonBody(request): JsonBody<PlaceOrder>,
) -> Result<Json<PlacedOrder>> {
    let workflow = OrderWorkflow::new(state.db(), state.factory(), state.telemetry());
    let placed = workflow.place_order(&identity, request).await?;
    Ok(Json(placed))
}
