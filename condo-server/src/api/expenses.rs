//! Expense endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use condo_common::db::expenses::{
    self, CategoryTotal, Expense, ExpenseFilter, ExpensePatch, NewExpense,
};
use condo_common::db::page::Page;
use serde::Deserialize;
use tracing::info;

use crate::error::{parse_id, ApiResult};
use crate::extract::{JsonBody, QueryParams};
use crate::AppState;

/// Query parameters for category totals
#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/expenses
pub async fn list_expenses(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<ExpenseFilter>,
) -> ApiResult<Json<Page<Expense>>> {
    Ok(Json(expenses::list(&state.db, &filter).await?))
}

/// POST /api/expenses
pub async fn create_expense(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewExpense>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    let expense = expenses::create(&state.db, new).await?;
    info!(
        "Recorded expense {} ({} cents, {})",
        expense.guid, expense.amount_cents, expense.category
    );
    Ok((StatusCode::CREATED, Json(expense)))
}

/// GET /api/expenses/categories?from&to
pub async fn category_totals(
    State(state): State<AppState>,
    QueryParams(range): QueryParams<DateRange>,
) -> ApiResult<Json<Vec<CategoryTotal>>> {
    Ok(Json(
        expenses::category_totals(&state.db, range.from, range.to).await?,
    ))
}

/// GET /api/expenses/:id
pub async fn get_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Expense>> {
    Ok(Json(expenses::get(&state.db, parse_id(&id)?).await?))
}

/// PUT /api/expenses/:id
pub async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ExpensePatch>,
) -> ApiResult<Json<Expense>> {
    Ok(Json(expenses::update(&state.db, parse_id(&id)?, patch).await?))
}

/// DELETE /api/expenses/:id
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    expenses::delete(&state.db, id).await?;
    info!("Deleted expense {}", id);
    Ok(StatusCode::NO_CONTENT)
}
