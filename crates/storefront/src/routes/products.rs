//! Product and category route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use little_sprout_core::{Category, CategoryId, Product, ProductId};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Product listing filters. At most one applies, in the order `q`,
/// `category`, `featured`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
}

/// Category detail body.
#[derive(Debug, Serialize)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<Product>,
}

/// List products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let catalog = state.catalog();

    let products = if let Some(term) = query.q.as_deref() {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::BadRequest("search term is empty".to_string()));
        }
        catalog.search_products(term).await?
    } else if let Some(category) = query.category {
        catalog
            .products_by_category(&CategoryId::new(category))
            .await?
    } else if query.featured == Some(true) {
        catalog.featured_products().await?
    } else {
        catalog.products().await?
    };

    Ok(Json(products))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    state
        .catalog()
        .product(&ProductId::new(id.as_str()))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// List categories.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.catalog().categories().await?))
}

/// Category detail with its in-stock products.
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CategoryView>> {
    let id = CategoryId::new(id);
    let category = state
        .catalog()
        .category(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;
    let products = state.catalog().products_by_category(&id).await?;

    Ok(Json(CategoryView { category, products }))
}
