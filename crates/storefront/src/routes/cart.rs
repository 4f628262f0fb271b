//! Cart route handlers.
//!
//! Every handler answers with the cart as the session manager last published
//! it. A mutation the manager reports as not applied becomes a 422, which the
//! client shows as a toast.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use little_sprout_core::{
    AddToCartRequest, CartItemId, CartSnapshot, Money, UpdateCartItemRequest,
};

use crate::cart::CartSessionManager;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Formatted totals for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalsView {
    pub subtotal: String,
    pub tax: Option<String>,
    pub shipping: Option<String>,
    pub total: String,
}

/// Cart response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    #[serde(flatten)]
    pub snapshot: CartSnapshot,
    pub display: TotalsView,
    pub shipping_message: String,
    pub free_shipping_remaining: Option<Money>,
}

impl CartView {
    /// Build the view of the manager's current snapshot.
    #[must_use]
    pub fn current(cart: &CartSessionManager) -> Self {
        let snapshot = cart.current_snapshot();
        let summary = &snapshot.summary;
        let display = TotalsView {
            subtotal: summary.subtotal.to_string(),
            tax: summary.tax.map(|tax| tax.to_string()),
            shipping: summary.shipping.map(|shipping| shipping.to_string()),
            total: summary.total_amount.to_string(),
        };

        Self {
            display,
            shipping_message: cart.shipping_message(),
            free_shipping_remaining: cart.free_shipping_remaining(),
            snapshot,
        }
    }
}

/// Cart count badge body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCount {
    pub count: u64,
}

/// Remove request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub cart_item_id: CartItemId,
}

fn applied(cart: &CartSessionManager, ok: bool, action: &str) -> Result<Json<CartView>> {
    if ok {
        Ok(Json(CartView::current(cart)))
    } else {
        Err(AppError::CartOperation(action.to_string()))
    }
}

/// Current cart.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Json<CartView> {
    Json(CartView::current(state.cart()))
}

/// Total quantity across the cart.
#[instrument(skip(state))]
pub async fn count(State(state): State<AppState>) -> Json<CartCount> {
    Json(CartCount {
        count: state.cart().item_count(),
    })
}

/// Add a product selection.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    add_breadcrumb(
        "cart",
        "Add to cart",
        Some(&[("product_id", request.product_id.as_str())]),
    );
    let ok = state.cart().add(request).await;
    applied(state.cart(), ok, "add to cart")
}

/// Change a line's quantity or variant.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>> {
    let ok = state.cart().update(request).await;
    applied(state.cart(), ok, "update cart item")
}

/// Remove a line.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let ok = state.cart().remove(request.cart_item_id).await;
    applied(state.cart(), ok, "remove cart item")
}

/// Remove every line.
#[instrument(skip(state))]
pub async fn clear(State(state): State<AppState>) -> Result<Json<CartView>> {
    add_breadcrumb("cart", "Clear cart", None);
    let ok = state.cart().clear().await;
    applied(state.cart(), ok, "clear cart")
}
