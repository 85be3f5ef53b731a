//! Owner and tenant endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use condo_common::db::page::Page;
use condo_common::db::people::{self, NewPerson, Person, PersonFilter, PersonPatch};
use tracing::info;

use crate::error::{parse_id, ApiResult};
use crate::extract::{JsonBody, QueryParams};
use crate::AppState;

/// GET /api/people
pub async fn list_people(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<PersonFilter>,
) -> ApiResult<Json<Page<Person>>> {
    Ok(Json(people::list(&state.db, &filter).await?))
}

/// POST /api/people
pub async fn create_person(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewPerson>,
) -> ApiResult<(StatusCode, Json<Person>)> {
    let person = people::create(&state.db, new).await?;
    info!("Added {} {} to unit {}", person.role, person.guid, person.unit_id);
    Ok((StatusCode::CREATED, Json(person)))
}

/// GET /api/people/:id
pub async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Person>> {
    Ok(Json(people::get(&state.db, parse_id(&id)?).await?))
}

/// PUT /api/people/:id
pub async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<PersonPatch>,
) -> ApiResult<Json<Person>> {
    Ok(Json(people::update(&state.db, parse_id(&id)?, patch).await?))
}

/// DELETE /api/people/:id
pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    people::delete(&state.db, id).await?;
    info!("Deleted person {}", id);
    Ok(StatusCode::NO_CONTENT)
}
