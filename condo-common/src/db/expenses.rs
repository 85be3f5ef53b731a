//! Expense database operations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::page::{Page, PageRequest};
use crate::db::query_builder::{
    FilterOp, InsertBuilder, SelectBuilder, SortOrder, TableSpec, UpdateBuilder,
};
use crate::db::record::{self, clean_text, require_text, uuid_column, Record};
use crate::money::require_positive;
use crate::serde_utils::double_option;
use crate::{Error, Result};

pub const EXPENSES_TABLE: TableSpec = TableSpec {
    name: "expenses",
    key: "guid",
    columns: &[
        "guid",
        "expense_date",
        "category",
        "vendor",
        "description",
        "amount_cents",
        "created_at",
        "updated_at",
    ],
    default_sort: "expense_date",
};

/// Expense record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Expense {
    pub guid: Uuid,
    pub expense_date: NaiveDate,
    pub category: String,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for Expense {
    const TABLE: &'static TableSpec = &EXPENSES_TABLE;
    const LABEL: &'static str = "Expense";

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            guid: uuid_column(row, "guid")?,
            expense_date: row.try_get("expense_date")?,
            category: row.try_get("category")?,
            vendor: row.try_get("vendor")?,
            description: row.try_get("description")?,
            amount_cents: row.try_get("amount_cents")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub expense_date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub amount_cents: i64,
}

impl NewExpense {
    pub fn validated(self) -> Result<Self> {
        require_positive("amount_cents", self.amount_cents)?;
        Ok(Self {
            expense_date: self.expense_date,
            category: require_text("category", &self.category)?,
            vendor: clean_text(self.vendor),
            description: clean_text(self.description),
            amount_cents: self.amount_cents,
        })
    }
}

/// Partial update payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpensePatch {
    #[serde(default)]
    pub expense_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub vendor: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

/// Listing filter (query string)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub min_cents: Option<i64>,
    pub max_cents: Option<i64>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Spend per category over a date range
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub count: i64,
    pub total_cents: i64,
}

fn check_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if to < from {
            return Err(Error::InvalidInput(format!(
                "Date range is inverted: from {} to {}",
                from, to
            )));
        }
    }
    Ok(())
}

/// List expenses
pub async fn list(pool: &SqlitePool, filter: &ExpenseFilter) -> Result<Page<Expense>> {
    check_range(filter.from, filter.to)?;

    let select = SelectBuilder::new(&EXPENSES_TABLE)
        .filter_opt("category", FilterOp::Eq, clean_text(filter.category.clone()))?
        .filter_opt("vendor", FilterOp::Eq, clean_text(filter.vendor.clone()))?
        .filter_opt("expense_date", FilterOp::Gte, filter.from)?
        .filter_opt("expense_date", FilterOp::Lte, filter.to)?
        .filter_opt("amount_cents", FilterOp::Gte, filter.min_cents)?
        .filter_opt("amount_cents", FilterOp::Lte, filter.max_cents)?
        .search(&["description", "vendor"], filter.q.as_deref())?
        .order_by_opt(filter.sort.as_deref(), SortOrder::from_param(filter.order.as_deref()))?;

    record::fetch_page(pool, select, PageRequest::new(filter.page, filter.page_size)).await
}

/// Load expense by guid
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Expense> {
    record::require(pool, id).await
}

/// Save new expense
pub async fn create<'e, E>(executor: E, new: NewExpense) -> Result<Expense>
where
    E: SqliteExecutor<'e>,
{
    let new = new.validated()?;
    let insert = InsertBuilder::new(&EXPENSES_TABLE)
        .value("guid", Uuid::new_v4())?
        .value("expense_date", new.expense_date)?
        .value("category", new.category)?
        .value("vendor", new.vendor)?
        .value("description", new.description)?
        .value("amount_cents", new.amount_cents)?;

    record::insert(executor, insert).await
}

/// Apply a partial update
pub async fn update(pool: &SqlitePool, id: Uuid, patch: ExpensePatch) -> Result<Expense> {
    if let Some(amount) = patch.amount_cents {
        require_positive("amount_cents", amount)?;
    }
    let category = patch
        .category
        .as_deref()
        .map(|c| require_text("category", c))
        .transpose()?;

    let update = UpdateBuilder::new(&EXPENSES_TABLE)
        .set_opt("expense_date", patch.expense_date)?
        .set_opt("category", category)?
        .set_opt("vendor", patch.vendor.map(clean_text))?
        .set_opt("description", patch.description.map(clean_text))?
        .set_opt("amount_cents", patch.amount_cents)?;

    record::update(pool, id, update).await
}

/// Delete expense
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<()> {
    record::delete::<Expense>(pool, id).await
}

/// Total spend per category, optionally bounded by inclusive dates
pub async fn category_totals(
    pool: &SqlitePool,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<CategoryTotal>> {
    check_range(from, to)?;

    let rows = sqlx::query(
        r#"
        SELECT category, COUNT(*) AS count, SUM(amount_cents) AS total_cents
        FROM expenses
        WHERE (?1 IS NULL OR expense_date >= ?1)
          AND (?2 IS NULL OR expense_date <= ?2)
        GROUP BY category
        ORDER BY category ASC
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Error::from_aggregate)?;

    rows.iter()
        .map(|row| {
            Ok(CategoryTotal {
                category: row.try_get("category")?,
                count: row.try_get("count")?,
                total_cents: row.try_get("total_cents")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    fn expense(date: &str, category: &str, vendor: &str, cents: i64) -> NewExpense {
        NewExpense {
            expense_date: date.parse().unwrap(),
            category: category.to_string(),
            vendor: Some(vendor.to_string()),
            description: Some(format!("{} invoice", vendor)),
            amount_cents: cents,
        }
    }

    async fn seed(pool: &SqlitePool) {
        for new in [
            expense("2025-01-10", "Utilities", "City Water", 12_000),
            expense("2025-01-20", "Repairs", "Ace Plumbing", 45_000),
            expense("2025-02-05", "Utilities", "Power Co", 30_000),
            expense("2025-03-15", "Cleaning", "Sparkle", 8_000),
        ] {
            create(pool, new).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_validates_amount_and_category() {
        let pool = init_memory_database().await.unwrap();

        assert!(matches!(
            create(&pool, expense("2025-01-01", "Repairs", "X", 0)).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            create(&pool, expense("2025-01-01", "  ", "X", 100)).await,
            Err(Error::InvalidInput(_))
        ));

        let created = create(&pool, expense("2025-01-01", " Repairs ", "X", 100))
            .await
            .unwrap();
        assert_eq!(created.category, "Repairs");
        assert_eq!(get(&pool, created.guid).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let utilities = list(
            &pool,
            &ExpenseFilter {
                category: Some("Utilities".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(utilities.total, 2);

        let january = list(
            &pool,
            &ExpenseFilter {
                from: "2025-01-01".parse().ok(),
                to: "2025-01-31".parse().ok(),
                sort: Some("amount_cents".to_string()),
                order: Some("desc".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let amounts: Vec<i64> = january.items.iter().map(|e| e.amount_cents).collect();
        assert_eq!(amounts, vec![45_000, 12_000]);

        let mid_range = list(
            &pool,
            &ExpenseFilter {
                min_cents: Some(10_000),
                max_cents: Some(30_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(mid_range.total, 2);

        let search = list(
            &pool,
            &ExpenseFilter {
                q: Some("plumb".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(search.total, 1);
        assert_eq!(search.items[0].vendor.as_deref(), Some("Ace Plumbing"));
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let pool = init_memory_database().await.unwrap();
        let result = list(
            &pool,
            &ExpenseFilter {
                from: "2025-02-01".parse().ok(),
                to: "2025-01-01".parse().ok(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_category_totals() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let all = category_totals(&pool, None, None).await.unwrap();
        assert_eq!(
            all,
            vec![
                CategoryTotal {
                    category: "Cleaning".to_string(),
                    count: 1,
                    total_cents: 8_000
                },
                CategoryTotal {
                    category: "Repairs".to_string(),
                    count: 1,
                    total_cents: 45_000
                },
                CategoryTotal {
                    category: "Utilities".to_string(),
                    count: 2,
                    total_cents: 42_000
                },
            ]
        );

        let february = category_totals(&pool, "2025-02-01".parse().ok(), "2025-02-28".parse().ok())
            .await
            .unwrap();
        assert_eq!(february.len(), 1);
        assert_eq!(february[0].total_cents, 30_000);
    }

    #[tokio::test]
    async fn test_patch_clears_vendor() {
        let pool = init_memory_database().await.unwrap();
        let created = create(&pool, expense("2025-01-01", "Repairs", "X", 100))
            .await
            .unwrap();

        let patch: ExpensePatch =
            serde_json::from_str(r#"{"vendor": null, "amount_cents": 250}"#).unwrap();
        let updated = update(&pool, created.guid, patch).await.unwrap();
        assert_eq!(updated.vendor, None);
        assert_eq!(updated.amount_cents, 250);
        assert_eq!(updated.description, created.description);
    }
}
