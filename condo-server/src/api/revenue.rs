//! Revenue endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use condo_common::db::page::Page;
use condo_common::db::revenue::{self, NewRevenue, Revenue, RevenueFilter, RevenuePatch};
use tracing::info;

use crate::error::{parse_id, ApiResult};
use crate::extract::{JsonBody, QueryParams};
use crate::AppState;

/// GET /api/revenue
pub async fn list_revenue(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<RevenueFilter>,
) -> ApiResult<Json<Page<Revenue>>> {
    Ok(Json(revenue::list(&state.db, &filter).await?))
}

/// POST /api/revenue
pub async fn create_revenue(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewRevenue>,
) -> ApiResult<(StatusCode, Json<Revenue>)> {
    let entry = revenue::create(&state.db, new).await?;
    info!(
        "Recorded {} revenue {} for {} ({} cents)",
        entry.source, entry.guid, entry.period, entry.amount_cents
    );
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/revenue/:id
pub async fn get_revenue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Revenue>> {
    Ok(Json(revenue::get(&state.db, parse_id(&id)?).await?))
}

/// PUT /api/revenue/:id
pub async fn update_revenue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<RevenuePatch>,
) -> ApiResult<Json<Revenue>> {
    Ok(Json(revenue::update(&state.db, parse_id(&id)?, patch).await?))
}

/// DELETE /api/revenue/:id
pub async fn delete_revenue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    revenue::delete(&state.db, id).await?;
    info!("Deleted revenue {}", id);
    Ok(StatusCode::NO_CONTENT)
}
