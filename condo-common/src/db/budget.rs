//! Budget line database operations
//!
//! One planned amount per (year, category). Lines are addressed by their
//! natural key rather than by guid.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::query_builder::TableSpec;
use crate::db::record::{require_text, uuid_column, Record};
use crate::money::require_non_negative;
use crate::time::validate_year;
use crate::{Error, Result};

pub const BUDGET_LINES_TABLE: TableSpec = TableSpec {
    name: "budget_lines",
    key: "guid",
    columns: &[
        "guid",
        "year",
        "category",
        "planned_cents",
        "created_at",
        "updated_at",
    ],
    default_sort: "category",
};

/// Planned yearly spend for one category
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BudgetLine {
    pub guid: Uuid,
    pub year: i32,
    pub category: String,
    pub planned_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for BudgetLine {
    const TABLE: &'static TableSpec = &BUDGET_LINES_TABLE;
    const LABEL: &'static str = "Budget line";

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            guid: uuid_column(row, "guid")?,
            year: row.try_get("year")?,
            category: row.try_get("category")?,
            planned_cents: row.try_get("planned_cents")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Body of `PUT /api/budget/:year/lines/:category`
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedAmount {
    pub planned_cents: i64,
}

/// Insert or replace the planned amount for a category
pub async fn upsert_line<'e, E>(
    executor: E,
    year: i32,
    category: &str,
    planned_cents: i64,
) -> Result<BudgetLine>
where
    E: SqliteExecutor<'e>,
{
    validate_year(year)?;
    let category = require_text("category", category)?;
    require_non_negative("planned_cents", planned_cents)?;

    let sql = format!(
        r#"
        INSERT INTO budget_lines (guid, year, category, planned_cents)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (year, category) DO UPDATE SET
            planned_cents = excluded.planned_cents,
            updated_at = CURRENT_TIMESTAMP
        RETURNING {}
        "#,
        BUDGET_LINES_TABLE.column_list()
    );

    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(year)
        .bind(&category)
        .bind(planned_cents)
        .fetch_one(executor)
        .await
        .map_err(Error::from_write)?;

    BudgetLine::from_row(&row)
}

/// All lines of a year, by category
pub async fn lines(pool: &SqlitePool, year: i32) -> Result<Vec<BudgetLine>> {
    validate_year(year)?;
    let sql = format!(
        "SELECT {} FROM budget_lines WHERE year = ? ORDER BY category ASC",
        BUDGET_LINES_TABLE.column_list()
    );
    let rows = sqlx::query(&sql).bind(year).fetch_all(pool).await?;
    rows.iter().map(BudgetLine::from_row).collect()
}

/// Remove one line
pub async fn delete_line(pool: &SqlitePool, year: i32, category: &str) -> Result<()> {
    validate_year(year)?;
    let category = require_text("category", category)?;

    let result = sqlx::query("DELETE FROM budget_lines WHERE year = ? AND category = ?")
        .bind(year)
        .bind(&category)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Budget line {} / {}",
            year, category
        )));
    }
    Ok(())
}
