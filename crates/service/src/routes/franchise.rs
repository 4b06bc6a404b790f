//! Franchise and store route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use serde::Deserialize;

use pizza_core::{FranchiseId, StoreId, UserId};

use crate::db::FranchiseQuery;
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{Franchise, FranchisePage, Store};
use crate::routes::{JsonBody, MessageResponse};
use crate::services::franchises::{CreateFranchise, CreateStore, FranchiseService};
use crate::state::AppState;

/// Largest page a client may request from the franchise listing.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Build the franchise router.
///
/// `/franchise/{id}` is a user id on `GET` and a franchise id on `DELETE`;
/// the router needs one parameter name per path.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/franchise", get(list_franchises).post(create_franchise))
        .route(
            "/franchise/{id}",
            get(user_franchises).delete(delete_franchise),
        )
        .route("/franchise/{id}/store", post(create_store))
        .route("/franchise/{id}/store/{store_id}", delete(delete_store))
}

/// Query parameters for the franchise listing.
#[derive(Debug, Default, Deserialize)]
pub struct FranchiseListQuery {
    #[serde(default)]
    pub page: u32,
    pub limit: Option<u32>,
    /// Name filter; `*` matches any run of characters.
    pub name: Option<String>,
}

/// List franchises. Admin callers also see admins and store revenue.
///
/// A bearer token is optional here: anonymous callers and callers with an
/// invalid token get the public view, so storefronts can show franchises
/// before login.
///
/// # Errors
///
/// 500 if the registry cannot be read.
pub async fn list_franchises(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Query(query): Query<FranchiseListQuery>,
) -> Result<Json<FranchisePage>> {
    let query = FranchiseQuery {
        page: query.page,
        limit: query
            .limit
            .unwrap_or(state.config().list_per_page)
            .clamp(1, MAX_PAGE_LIMIT),
        name: query.name.filter(|n| !n.trim().is_empty()),
    };

    let page = FranchiseService::new(state.db())
        .list(identity.as_ref(), &query)
        .await?;
    Ok(Json(page))
}

/// Franchises administered by a user.
///
/// # Errors
///
/// 401 without a valid token.
pub async fn user_franchises(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Franchise>>> {
    let franchises = FranchiseService::new(state.db())
        .for_user(&identity, user_id)
        .await?;
    Ok(Json(franchises))
}

/// Create a franchise.
///
/// # Errors
///
/// 403 unless the caller is an admin; 404 for an unknown admin email; 409
/// for a taken name.
pub async fn create_franchise(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    JsonBody(request): JsonBody<CreateFranchise>,
) -> Result<Json<Franchise>> {
    let franchise = FranchiseService::new(state.db())
        .create(&identity, request)
        .await?;
    Ok(Json(franchise))
}

/// Delete a franchise with its stores.
///
/// # Errors
///
/// 403 unless the caller is an admin.
pub async fn delete_franchise(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(franchise_id): Path<FranchiseId>,
) -> Result<Json<MessageResponse>> {
    FranchiseService::new(state.db())
        .delete(&identity, franchise_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "franchise deleted",
    }))
}

/// Create a store under a franchise.
///
/// # Errors
///
/// 403 unless the caller administers the franchise; 404 for an unknown
/// franchise.
pub async fn create_store(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(franchise_id): Path<FranchiseId>,
    JsonBody(request): JsonBody<CreateStore>,
) -> Result<Json<Store>> {
    let store = FranchiseService::new(state.db())
        .create_store(&identity, franchise_id, request)
        .await?;
    Ok(Json(store))
}

/// Delete a store.
///
/// # Errors
///
/// 403 unless the caller administers the franchise.
pub async fn delete_store(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path((franchise_id, store_id)): Path<(FranchiseId, StoreId)>,
) -> Result<Json<MessageResponse>> {
    FranchiseService::new(state.db())
        .delete_store(&identity, franchise_id, store_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "store deleted",
    }))
}
