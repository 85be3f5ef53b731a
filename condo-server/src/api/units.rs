//! Unit endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use condo_common::db::page::Page;
use condo_common::db::people::{self, Person};
use condo_common::db::units::{self, NewUnit, Unit, UnitFilter, UnitPatch};
use tracing::info;

use crate::error::{parse_id, ApiResult};
use crate::extract::{JsonBody, QueryParams};
use crate::AppState;

/// GET /api/units
pub async fn list_units(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<UnitFilter>,
) -> ApiResult<Json<Page<Unit>>> {
    Ok(Json(units::list(&state.db, &filter).await?))
}

/// POST /api/units
pub async fn create_unit(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewUnit>,
) -> ApiResult<(StatusCode, Json<Unit>)> {
    let unit = units::create(&state.db, new).await?;
    info!("Created unit {} ({})", unit.unit_number, unit.guid);
    Ok((StatusCode::CREATED, Json(unit)))
}

/// GET /api/units/:id
pub async fn get_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Unit>> {
    Ok(Json(units::get(&state.db, parse_id(&id)?).await?))
}

/// PUT /api/units/:id
pub async fn update_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UnitPatch>,
) -> ApiResult<Json<Unit>> {
    Ok(Json(units::update(&state.db, parse_id(&id)?, patch).await?))
}

/// DELETE /api/units/:id
///
/// 409 while revenue still references the unit.
pub async fn delete_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    units::delete(&state.db, id).await?;
    info!("Deleted unit {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/units/:id/people
pub async fn unit_people(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Person>>> {
    let unit = units::get(&state.db, parse_id(&id)?).await?;
    Ok(Json(people::list_for_unit(&state.db, unit.guid).await?))
}
