//! Franchise and store domain types.

use serde::Serialize;

use pizza_core::{Email, FranchiseId, Price, StoreId, UserId};

/// A franchise admin as shown on a franchise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FranchiseAdmin {
    pub id: UserId,
    pub name: String,
    pub email: Email,
}

/// A store belonging to a franchise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    /// Owning franchise; immutable after creation.
    pub franchise_id: FranchiseId,
    pub name: String,
    /// Sum of order line prices placed at this store.
    ///
    /// Only populated on the franchisee view of a franchise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<Price>,
}

/// A franchise with its admins and stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Franchise {
    pub id: FranchiseId,
    pub name: String,
    /// Hidden from non-admin listings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<FranchiseAdmin>,
    pub stores: Vec<Store>,
}

/// One page of the public franchise listing.
#[derive(Debug, Clone, Serialize)]
pub struct FranchisePage {
    pub franchises: Vec<Franchise>,
    /// Whether another page follows.
    pub more: bool,
}
