//! Balance and delinquency reports

use axum::{
    extract::State,
    Json,
};
use chrono::Datelike;
use condo_common::reports::{self, DelinquentUnit, UnitBalance};
use condo_common::time::{today, validate_year};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::QueryParams;
use crate::AppState;

/// Query parameters shared by the balance reports
#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
    /// 1..=12, defaults to 12
    pub through_month: Option<u32>,
    /// Delinquency threshold, defaults to 0
    pub min_balance_cents: Option<i64>,
}

impl BalanceQuery {
    fn year(&self) -> ApiResult<i32> {
        Ok(validate_year(self.year.unwrap_or_else(|| today().year()))?)
    }

    fn through_month(&self) -> u32 {
        self.through_month.unwrap_or(12)
    }
}

/// GET /api/reports/balances?year&through_month
pub async fn balances(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BalanceQuery>,
) -> ApiResult<Json<Vec<UnitBalance>>> {
    Ok(Json(
        reports::unit_balances(&state.db, query.year()?, query.through_month()).await?,
    ))
}

/// GET /api/reports/delinquent?year&through_month&min_balance_cents
pub async fn delinquent(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BalanceQuery>,
) -> ApiResult<Json<Vec<DelinquentUnit>>> {
    Ok(Json(
        reports::delinquent_units(
            &state.db,
            query.year()?,
            query.through_month(),
            query.min_balance_cents.unwrap_or(0),
        )
        .await?,
    ))
}
