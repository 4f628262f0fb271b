//! Sign-in and sign-out.
//!
//! Credentials are checked by the managed auth backend before these routes
//! are called; the service only records the outcome. Each handler runs the
//! cart transition itself and only then publishes the identity, so the
//! response carries the transition's result. By the time the background auth
//! listener sees the change the mode already matches and it does nothing.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::auth::{AuthEvent, Identity};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::routes::cart::CartView;
use crate::state::AppState;

/// Sign-in request body.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Record a sign-in and switch to the user's cart.
///
/// Responds 422 if the guest cart could not be fully merged. The user is
/// still signed in; the unmerged lines stay on the device.
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<CartView>> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }

    let identity = Identity {
        user_id: user_id.into(),
        email: request.email,
    };
    set_sentry_user(&identity.user_id, identity.email.as_deref());

    let merged = state
        .cart()
        .on_auth_transition(AuthEvent::SignedIn(identity.clone()))
        .await;
    state.auth().sign_in(identity);

    if !merged {
        return Err(AppError::CartOperation("merge the guest cart".to_string()));
    }
    Ok(Json(CartView::current(state.cart())))
}

/// Record a sign-out and switch back to the device cart.
#[instrument(skip(state))]
pub async fn sign_out(State(state): State<AppState>) -> Result<Json<CartView>> {
    clear_sentry_user();

    let loaded = state.cart().on_auth_transition(AuthEvent::SignedOut).await;
    state.auth().sign_out();

    if !loaded {
        return Err(AppError::CartOperation("load the device cart".to_string()));
    }
    Ok(Json(CartView::current(state.cart())))
}
