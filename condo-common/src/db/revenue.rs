//! Revenue (unit payments and other income) database operations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::page::{Page, PageRequest};
use crate::db::query_builder::{
    FilterOp, InsertBuilder, SelectBuilder, SortOrder, TableSpec, UpdateBuilder,
};
use crate::db::record::{self, clean_text, opt_uuid_column, uuid_column, Record};
use crate::money::require_positive;
use crate::serde_utils::double_option;
use crate::time::{parse_period, period_of};
use crate::{Error, Result};

pub const REVENUE_TABLE: TableSpec = TableSpec {
    name: "revenue",
    key: "guid",
    columns: &[
        "guid",
        "unit_id",
        "payment_date",
        "period",
        "source",
        "method",
        "amount_cents",
        "notes",
        "created_at",
        "updated_at",
    ],
    default_sort: "payment_date",
};

/// Kind of income
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueSource {
    #[default]
    Dues,
    SpecialAssessment,
    Other,
}

impl RevenueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RevenueSource::Dues => "dues",
            RevenueSource::SpecialAssessment => "special_assessment",
            RevenueSource::Other => "other",
        }
    }
}

impl fmt::Display for RevenueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevenueSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "dues" => Ok(RevenueSource::Dues),
            "special_assessment" => Ok(RevenueSource::SpecialAssessment),
            "other" => Ok(RevenueSource::Other),
            other => Err(Error::InvalidInput(format!(
                "Invalid revenue source '{}' (expected dues, special_assessment or other)",
                other
            ))),
        }
    }
}

/// Revenue record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Revenue {
    pub guid: Uuid,
    /// `None` for building-level income
    pub unit_id: Option<Uuid>,
    pub payment_date: NaiveDate,
    pub period: String,
    pub source: RevenueSource,
    pub method: Option<String>,
    pub amount_cents: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Revenue {
    const TABLE: &'static TableSpec = &REVENUE_TABLE;
    const LABEL: &'static str = "Revenue";

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let source: String = row.try_get("source")?;
        Ok(Self {
            guid: uuid_column(row, "guid")?,
            unit_id: opt_uuid_column(row, "unit_id")?,
            payment_date: row.try_get("payment_date")?,
            period: row.try_get("period")?,
            source: source.parse()?,
            method: row.try_get("method")?,
            amount_cents: row.try_get("amount_cents")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewRevenue {
    #[serde(default)]
    pub unit_id: Option<Uuid>,
    pub payment_date: NaiveDate,
    /// Defaults to the month of `payment_date`
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub source: RevenueSource,
    #[serde(default)]
    pub method: Option<String>,
    pub amount_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewRevenue {
    pub fn validated(self) -> Result<Self> {
        require_positive("amount_cents", self.amount_cents)?;
        let period = match clean_text(self.period) {
            Some(p) => parse_period(&p)?,
            None => period_of(self.payment_date),
        };
        Ok(Self {
            unit_id: self.unit_id,
            payment_date: self.payment_date,
            period: Some(period),
            source: self.source,
            method: clean_text(self.method),
            amount_cents: self.amount_cents,
            notes: clean_text(self.notes),
        })
    }
}

/// Partial update payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevenuePatch {
    #[serde(default, deserialize_with = "double_option")]
    pub unit_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub source: Option<RevenueSource>,
    #[serde(default, deserialize_with = "double_option")]
    pub method: Option<Option<String>>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

/// Listing filter (query string)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevenueFilter {
    pub unit_id: Option<Uuid>,
    pub source: Option<RevenueSource>,
    pub period: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub min_cents: Option<i64>,
    pub max_cents: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// List revenue
pub async fn list(pool: &SqlitePool, filter: &RevenueFilter) -> Result<Page<Revenue>> {
    let period = filter
        .period
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(parse_period)
        .transpose()?;

    let select = SelectBuilder::new(&REVENUE_TABLE)
        .filter_opt("unit_id", FilterOp::Eq, filter.unit_id)?
        .filter_opt("source", FilterOp::Eq, filter.source.map(RevenueSource::as_str))?
        .filter_opt("period", FilterOp::Eq, period)?
        .filter_opt("payment_date", FilterOp::Gte, filter.from)?
        .filter_opt("payment_date", FilterOp::Lte, filter.to)?
        .filter_opt("amount_cents", FilterOp::Gte, filter.min_cents)?
        .filter_opt("amount_cents", FilterOp::Lte, filter.max_cents)?
        .order_by_opt(filter.sort.as_deref(), SortOrder::from_param(filter.order.as_deref()))?;

    record::fetch_page(pool, select, PageRequest::new(filter.page, filter.page_size)).await
}

/// Load revenue by guid
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Revenue> {
    record::require(pool, id).await
}

/// Save new revenue
pub async fn create<'e, E>(executor: E, new: NewRevenue) -> Result<Revenue>
where
    E: SqliteExecutor<'e>,
{
    let new = new.validated()?;
    let insert = InsertBuilder::new(&REVENUE_TABLE)
        .value("guid", Uuid::new_v4())?
        .value("unit_id", new.unit_id)?
        .value("payment_date", new.payment_date)?
        .value("period", new.period)?
        .value("source", new.source.as_str())?
        .value("method", new.method)?
        .value("amount_cents", new.amount_cents)?
        .value("notes", new.notes)?;

    record::insert(executor, insert).await
}

/// Apply a partial update
///
/// Changing `payment_date` without an explicit `period` keeps the stored
/// period; payments are often credited to a month other than the one paid in.
pub async fn update(pool: &SqlitePool, id: Uuid, patch: RevenuePatch) -> Result<Revenue> {
    if let Some(amount) = patch.amount_cents {
        require_positive("amount_cents", amount)?;
    }
    let period = patch.period.as_deref().map(parse_period).transpose()?;

    let update = UpdateBuilder::new(&REVENUE_TABLE)
        .set_opt("unit_id", patch.unit_id)?
        .set_opt("payment_date", patch.payment_date)?
        .set_opt("period", period)?
        .set_opt("source", patch.source.map(RevenueSource::as_str))?
        .set_opt("method", patch.method.map(clean_text))?
        .set_opt("amount_cents", patch.amount_cents)?
        .set_opt("notes", patch.notes.map(clean_text))?;

    record::update(pool, id, update).await
}

/// Delete revenue
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<()> {
    record::delete::<Revenue>(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::db::units::{self, NewUnit};

    async fn unit(pool: &SqlitePool) -> Uuid {
        units::create(
            pool,
            NewUnit {
                unit_number: "7G".to_string(),
                floor: Some(7),
                area_sqm: None,
                monthly_fee_cents: 20_000,
                notes: None,
            },
        )
        .await
        .unwrap()
        .guid
    }

    fn payment(unit_id: Option<Uuid>, date: &str, cents: i64) -> NewRevenue {
        NewRevenue {
            unit_id,
            payment_date: date.parse().unwrap(),
            period: None,
            source: RevenueSource::Dues,
            method: Some("transfer".to_string()),
            amount_cents: cents,
            notes: None,
        }
    }

    #[test]
    fn test_source_parsing() {
        assert_eq!(
            "Special Assessment".parse::<RevenueSource>().unwrap(),
            RevenueSource::SpecialAssessment
        );
        assert_eq!("DUES".parse::<RevenueSource>().unwrap(), RevenueSource::Dues);
        assert!("gift".parse::<RevenueSource>().is_err());
    }

    #[tokio::test]
    async fn test_period_derived_from_payment_date() {
        let pool = init_memory_database().await.unwrap();
        let unit_id = unit(&pool).await;

        let derived = create(&pool, payment(Some(unit_id), "2025-04-03", 20_000))
            .await
            .unwrap();
        assert_eq!(derived.period, "2025-04");

        let mut explicit = payment(Some(unit_id), "2025-04-28", 20_000);
        explicit.period = Some("2025-5".to_string());
        let explicit = create(&pool, explicit).await.unwrap();
        assert_eq!(explicit.period, "2025-05");

        let mut bad = payment(Some(unit_id), "2025-04-28", 20_000);
        bad.period = Some("2025-13".to_string());
        assert!(matches!(create(&pool, bad).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_building_income_and_filters() {
        let pool = init_memory_database().await.unwrap();
        let unit_id = unit(&pool).await;

        create(&pool, payment(Some(unit_id), "2025-01-05", 20_000)).await.unwrap();
        create(&pool, payment(Some(unit_id), "2025-02-05", 20_000)).await.unwrap();
        let mut laundry = payment(None, "2025-02-10", 3_500);
        laundry.source = RevenueSource::Other;
        let laundry = create(&pool, laundry).await.unwrap();
        assert_eq!(laundry.unit_id, None);

        let for_unit = list(
            &pool,
            &RevenueFilter {
                unit_id: Some(unit_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(for_unit.total, 2);

        let february = list(
            &pool,
            &RevenueFilter {
                period: Some("2025-02".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(february.total, 2);

        let other = list(
            &pool,
            &RevenueFilter {
                source: Some(RevenueSource::Other),
                max_cents: Some(5_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(other.total, 1);
        assert_eq!(other.items[0].guid, laundry.guid);
    }

    #[tokio::test]
    async fn test_unit_with_revenue_cannot_be_deleted() {
        let pool = init_memory_database().await.unwrap();
        let unit_id = unit(&pool).await;
        let paid = create(&pool, payment(Some(unit_id), "2025-01-05", 20_000))
            .await
            .unwrap();

        let err = units::delete(&pool, unit_id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);

        delete(&pool, paid.guid).await.unwrap();
        units::delete(&pool, unit_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_patch_detaches_unit() {
        let pool = init_memory_database().await.unwrap();
        let unit_id = unit(&pool).await;
        let paid = create(&pool, payment(Some(unit_id), "2025-01-05", 20_000))
            .await
            .unwrap();

        let patch: RevenuePatch =
            serde_json::from_str(r#"{"unit_id": null, "source": "other"}"#).unwrap();
        let updated = update(&pool, paid.guid, patch).await.unwrap();
        assert_eq!(updated.unit_id, None);
        assert_eq!(updated.source, RevenueSource::Other);
        assert_eq!(updated.period, "2025-01");
    }
}
