//! Unit database operations

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::page::{Page, PageRequest};
use crate::db::query_builder::{
    FilterOp, InsertBuilder, SelectBuilder, SortOrder, TableSpec, UpdateBuilder,
};
use crate::db::record::{self, clean_text, require_text, uuid_column, Record};
use crate::money::require_non_negative;
use crate::serde_utils::double_option;
use crate::{Error, Result};

pub const UNITS_TABLE: TableSpec = TableSpec {
    name: "units",
    key: "guid",
    columns: &[
        "guid",
        "unit_number",
        "floor",
        "area_sqm",
        "monthly_fee_cents",
        "notes",
        "created_at",
        "updated_at",
    ],
    default_sort: "unit_number",
};

/// Unit record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Unit {
    pub guid: Uuid,
    pub unit_number: String,
    pub floor: Option<i64>,
    pub area_sqm: Option<f64>,
    pub monthly_fee_cents: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Unit {
    const TABLE: &'static TableSpec = &UNITS_TABLE;
    const LABEL: &'static str = "Unit";

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            guid: uuid_column(row, "guid")?,
            unit_number: row.try_get("unit_number")?,
            floor: row.try_get("floor")?,
            area_sqm: row.try_get("area_sqm")?,
            monthly_fee_cents: row.try_get("monthly_fee_cents")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewUnit {
    pub unit_number: String,
    #[serde(default)]
    pub floor: Option<i64>,
    #[serde(default)]
    pub area_sqm: Option<f64>,
    #[serde(default)]
    pub monthly_fee_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewUnit {
    /// Validate and normalize (trim text, blank → None)
    pub fn validated(self) -> Result<Self> {
        require_non_negative("monthly_fee_cents", self.monthly_fee_cents)?;
        validate_area(self.area_sqm)?;
        Ok(Self {
            unit_number: require_text("unit_number", &self.unit_number)?,
            floor: self.floor,
            area_sqm: self.area_sqm,
            monthly_fee_cents: self.monthly_fee_cents,
            notes: clean_text(self.notes),
        })
    }
}

/// Partial update payload; `null` clears nullable columns
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitPatch {
    #[serde(default)]
    pub unit_number: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub floor: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub area_sqm: Option<Option<f64>>,
    #[serde(default)]
    pub monthly_fee_cents: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

/// Listing filter (query string)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitFilter {
    pub q: Option<String>,
    pub floor: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn validate_area(area: Option<f64>) -> Result<()> {
    match area {
        Some(a) if !a.is_finite() || a < 0.0 => Err(Error::InvalidInput(format!(
            "area_sqm must be a non-negative number (got {})",
            a
        ))),
        _ => Ok(()),
    }
}

/// List units
pub async fn list(pool: &SqlitePool, filter: &UnitFilter) -> Result<Page<Unit>> {
    let select = SelectBuilder::new(&UNITS_TABLE)
        .search(&["unit_number", "notes"], filter.q.as_deref())?
        .filter_opt("floor", FilterOp::Eq, filter.floor)?
        .order_by_opt(filter.sort.as_deref(), SortOrder::from_param(filter.order.as_deref()))?;

    record::fetch_page(pool, select, PageRequest::new(filter.page, filter.page_size)).await
}

/// Load unit by guid
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Unit> {
    record::require(pool, id).await
}

/// Load unit by its unit number
pub async fn find_by_number<'e, E>(executor: E, unit_number: &str) -> Result<Option<Unit>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM units WHERE unit_number = ?",
        UNITS_TABLE.column_list()
    );
    let row = sqlx::query(&sql)
        .bind(unit_number.trim())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(Unit::from_row).transpose()
}

/// Save new unit
pub async fn create<'e, E>(executor: E, new: NewUnit) -> Result<Unit>
where
    E: SqliteExecutor<'e>,
{
    let new = new.validated()?;
    let insert = InsertBuilder::new(&UNITS_TABLE)
        .value("guid", Uuid::new_v4())?
        .value("unit_number", new.unit_number)?
        .value("floor", new.floor)?
        .value("area_sqm", new.area_sqm)?
        .value("monthly_fee_cents", new.monthly_fee_cents)?
        .value("notes", new.notes)?;

    record::insert(executor, insert).await
}

/// Apply a partial update
pub async fn update(pool: &SqlitePool, id: Uuid, patch: UnitPatch) -> Result<Unit> {
    let unit_number = patch
        .unit_number
        .as_deref()
        .map(|n| require_text("unit_number", n))
        .transpose()?;
    if let Some(fee) = patch.monthly_fee_cents {
        require_non_negative("monthly_fee_cents", fee)?;
    }
    if let Some(area) = patch.area_sqm {
        validate_area(area)?;
    }

    let update = UpdateBuilder::new(&UNITS_TABLE)
        .set_opt("unit_number", unit_number)?
        .set_opt("floor", patch.floor)?
        .set_opt("area_sqm", patch.area_sqm)?
        .set_opt("monthly_fee_cents", patch.monthly_fee_cents)?
        .set_opt("notes", patch.notes.map(clean_text))?;

    record::update(pool, id, update).await
}

/// Delete unit (occupants cascade; fails with `Conflict` if revenue references it)
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<()> {
    record::delete::<Unit>(pool, id).await
}
