//! Catalog endpoints: search, detail and recently viewed products.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use aroma_core::validation::validate_search_query;
use aroma_core::Product;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: u32 = 20;
const MAX_SEARCH_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

/// `GET /api/products?q=&limit=`
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let query = validate_search_query(&params.q)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    Ok(Json(state.db.products().search(&query, limit).await?))
}

async fn active_product(state: &AppState, id: &str) -> ApiResult<Product> {
    state
        .db
        .products()
        .get_by_id(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {}", id)))
}

/// `GET /api/products/{id}`
pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(active_product(&state, &id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyViewedIds {
    pub product_ids: Vec<String>,
}

/// `POST /api/products/{id}/view`
pub async fn record_view(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RecentlyViewedIds>> {
    let product = active_product(&state, &id).await?;
    let product_ids = state
        .recently_viewed
        .record(&user.customer_id, &product.id)
        .await;

    Ok(Json(RecentlyViewedIds { product_ids }))
}

/// `GET /api/recently-viewed`
///
/// Products no longer sold are dropped from the list.
pub async fn recently_viewed(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Product>>> {
    let ids = state.recently_viewed.list(&user.customer_id).await;

    let mut products = Vec::with_capacity(ids.len());
    for id in ids {
        match state.db.products().get_by_id(&id).await? {
            Some(product) if product.is_active => products.push(product),
            _ => state.recently_viewed.forget(&user.customer_id, &id).await,
        }
    }

    Ok(Json(products))
}
