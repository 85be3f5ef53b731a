//! Budget lines and yearly summary
//!
//! Lines are addressed by `(year, category)`; PUT creates or replaces.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use condo_common::db::budget::{self, BudgetLine, PlannedAmount};
use condo_common::reports::{self, BudgetSummary};
use tracing::info;

use crate::error::{parse_year, ApiResult};
use crate::extract::JsonBody;
use crate::AppState;

/// GET /api/budget/:year/lines
pub async fn list_lines(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> ApiResult<Json<Vec<BudgetLine>>> {
    Ok(Json(budget::lines(&state.db, parse_year(&year)?).await?))
}

/// PUT /api/budget/:year/lines/:category
pub async fn upsert_line(
    State(state): State<AppState>,
    Path((year, category)): Path<(String, String)>,
    JsonBody(body): JsonBody<PlannedAmount>,
) -> ApiResult<Json<BudgetLine>> {
    let year = parse_year(&year)?;
    let line = budget::upsert_line(&state.db, year, &category, body.planned_cents).await?;
    info!(
        "Budget {} / {} set to {} cents",
        line.year, line.category, line.planned_cents
    );
    Ok(Json(line))
}

/// DELETE /api/budget/:year/lines/:category
pub async fn delete_line(
    State(state): State<AppState>,
    Path((year, category)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let year = parse_year(&year)?;
    budget::delete_line(&state.db, year, &category).await?;
    info!("Deleted budget line {} / {}", year, category.trim());
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/budget/:year/summary
pub async fn summary(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> ApiResult<Json<BudgetSummary>> {
    Ok(Json(
        reports::budget_summary(&state.db, parse_year(&year)?).await?,
    ))
}
