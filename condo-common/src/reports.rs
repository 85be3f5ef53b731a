//! Budget and balance reports
//!
//! Read-only aggregations over the ledger tables. Every figure is in cents.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::db::budget;
use crate::db::people::{self, PersonRole};
use crate::db::record::uuid_column;
use crate::money::{checked_diff, checked_times, checked_total};
use crate::time::{month_periods, today, validate_year};
use crate::{Error, Result};

/// Planned vs actual spend for one category
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryLine {
    pub category: String,
    pub planned_cents: i64,
    pub actual_cents: i64,
    /// `planned - actual`; negative means over budget
    pub variance_cents: i64,
}

/// Income and spend for one `YYYY-MM` period
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthLine {
    pub period: String,
    pub revenue_cents: i64,
    pub expense_cents: i64,
    pub net_cents: i64,
}

/// Yearly budget summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BudgetSummary {
    pub year: i32,
    pub revenue_cents: i64,
    pub expense_cents: i64,
    pub net_cents: i64,
    pub planned_expense_cents: i64,
    pub categories: Vec<CategoryLine>,
    pub months: Vec<MonthLine>,
}

/// Dues owed by one unit for the first months of a year
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnitBalance {
    pub unit_id: Uuid,
    pub unit_number: String,
    pub monthly_fee_cents: i64,
    pub months: u32,
    pub expected_cents: i64,
    pub paid_cents: i64,
    /// Positive means the unit owes money
    pub balance_cents: i64,
}

/// Who to contact about an outstanding balance
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Contact {
    pub full_name: String,
    pub role: PersonRole,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DelinquentUnit {
    #[serde(flatten)]
    pub balance: UnitBalance,
    pub contacts: Vec<Contact>,
}

fn validate_through_month(month: u32) -> Result<u32> {
    if !(1..=12).contains(&month) {
        return Err(Error::InvalidInput(format!(
            "through_month must be between 1 and 12 (got {})",
            month
        )));
    }
    Ok(month)
}

async fn sums_by_key(pool: &SqlitePool, sql: &str, year: i32) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query(sql)
        .bind(format!("{:04}", year))
        .fetch_all(pool)
        .await
        .map_err(Error::from_aggregate)?;

    let mut sums = BTreeMap::new();
    for row in rows {
        let key: String = row.try_get("bucket")?;
        let total: i64 = row.try_get("total")?;
        sums.insert(key, total);
    }
    Ok(sums)
}

/// Revenue and expenses of a year by month, and spend against budget by category
pub async fn budget_summary(pool: &SqlitePool, year: i32) -> Result<BudgetSummary> {
    validate_year(year)?;

    let revenue_by_period = sums_by_key(
        pool,
        "SELECT period AS bucket, SUM(amount_cents) AS total FROM revenue \
         WHERE substr(period, 1, 4) = ? GROUP BY period",
        year,
    )
    .await?;
    let expenses_by_period = sums_by_key(
        pool,
        "SELECT substr(expense_date, 1, 7) AS bucket, SUM(amount_cents) AS total FROM expenses \
         WHERE substr(expense_date, 1, 4) = ? GROUP BY bucket",
        year,
    )
    .await?;
    let actual_by_category = sums_by_key(
        pool,
        "SELECT category AS bucket, SUM(amount_cents) AS total FROM expenses \
         WHERE substr(expense_date, 1, 4) = ? GROUP BY category",
        year,
    )
    .await?;

    let planned_by_category: BTreeMap<String, i64> = budget::lines(pool, year)
        .await?
        .into_iter()
        .map(|line| (line.category, line.planned_cents))
        .collect();

    let mut category_names: Vec<&String> = planned_by_category
        .keys()
        .chain(actual_by_category.keys())
        .collect();
    category_names.sort();
    category_names.dedup();

    let categories = category_names
        .into_iter()
        .map(|name| {
            let planned = planned_by_category.get(name).copied().unwrap_or(0);
            let actual = actual_by_category.get(name).copied().unwrap_or(0);
            Ok(CategoryLine {
                category: name.clone(),
                planned_cents: planned,
                actual_cents: actual,
                variance_cents: checked_diff(planned, actual)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let months = month_periods(year)
        .into_iter()
        .map(|period| {
            let revenue = revenue_by_period.get(&period).copied().unwrap_or(0);
            let expense = expenses_by_period.get(&period).copied().unwrap_or(0);
            Ok(MonthLine {
                period,
                revenue_cents: revenue,
                expense_cents: expense,
                net_cents: checked_diff(revenue, expense)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let revenue_cents = checked_total(months.iter().map(|m| m.revenue_cents))?;
    let expense_cents = checked_total(months.iter().map(|m| m.expense_cents))?;

    Ok(BudgetSummary {
        year,
        revenue_cents,
        expense_cents,
        net_cents: checked_diff(revenue_cents, expense_cents)?,
        planned_expense_cents: checked_total(planned_by_category.values().copied())?,
        categories,
        months,
    })
}

/// Expected vs paid dues for every unit, January through `through_month`
pub async fn unit_balances(
    pool: &SqlitePool,
    year: i32,
    through_month: u32,
) -> Result<Vec<UnitBalance>> {
    validate_year(year)?;
    let months = validate_through_month(through_month)?;

    let rows = sqlx::query(
        r#"
        SELECT u.guid, u.unit_number, u.monthly_fee_cents,
               COALESCE(SUM(r.amount_cents), 0) AS paid_cents
        FROM units u
        LEFT JOIN revenue r
          ON r.unit_id = u.guid
         AND r.source = 'dues'
         AND r.period >= ?
         AND r.period <= ?
        GROUP BY u.guid, u.unit_number, u.monthly_fee_cents
        ORDER BY u.unit_number ASC
        "#,
    )
    .bind(format!("{:04}-01", year))
    .bind(format!("{:04}-{:02}", year, months))
    .fetch_all(pool)
    .await
    .map_err(Error::from_aggregate)?;

    rows.iter()
        .map(|row| {
            let monthly_fee_cents: i64 = row.try_get("monthly_fee_cents")?;
            let paid_cents: i64 = row.try_get("paid_cents")?;
            let expected_cents = checked_times(monthly_fee_cents, months)?;
            Ok(UnitBalance {
                unit_id: uuid_column(row, "guid")?,
                unit_number: row.try_get("unit_number")?,
                monthly_fee_cents,
                months,
                expected_cents,
                paid_cents,
                balance_cents: checked_diff(expected_cents, paid_cents)?,
            })
        })
        .collect()
}

/// Units owing more than `min_balance_cents`, largest balance first,
/// with the contact details of their current owners and tenants
pub async fn delinquent_units(
    pool: &SqlitePool,
    year: i32,
    through_month: u32,
    min_balance_cents: i64,
) -> Result<Vec<DelinquentUnit>> {
    let mut owing: Vec<UnitBalance> = unit_balances(pool, year, through_month)
        .await?
        .into_iter()
        .filter(|b| b.balance_cents > min_balance_cents)
        .collect();
    owing.sort_by(|a, b| {
        b.balance_cents
            .cmp(&a.balance_cents)
            .then_with(|| a.unit_number.cmp(&b.unit_number))
    });

    let day = today();
    let mut delinquent = Vec::with_capacity(owing.len());
    for balance in owing {
        let contacts = people::list_for_unit(pool, balance.unit_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active_on(day))
            .map(|p| Contact {
                full_name: p.full_name,
                role: p.role,
                email: p.email,
                phone: p.phone,
            })
            .collect();
        delinquent.push(DelinquentUnit { balance, contacts });
    }
    Ok(delinquent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::expenses::{self, NewExpense};
    use crate::db::init_memory_database;
    use crate::db::people::NewPerson;
    use crate::db::revenue::{self, NewRevenue, RevenueSource};
    use crate::db::units::{self, NewUnit};
    use chrono::NaiveDate;

    async fn unit(pool: &SqlitePool, number: &str, fee: i64) -> Uuid {
        units::create(
            pool,
            NewUnit {
                unit_number: number.to_string(),
                floor: None,
                area_sqm: None,
                monthly_fee_cents: fee,
                notes: None,
            },
        )
        .await
        .unwrap()
        .guid
    }

    async fn pay(pool: &SqlitePool, unit_id: Option<Uuid>, period: &str, source: RevenueSource, cents: i64) {
        revenue::create(
            pool,
            NewRevenue {
                unit_id,
                payment_date: format!("{}-05", period).parse().unwrap(),
                period: Some(period.to_string()),
                source,
                method: None,
                amount_cents: cents,
                notes: None,
            },
        )
        .await
        .unwrap();
    }

    async fn spend(pool: &SqlitePool, date: &str, category: &str, cents: i64) {
        expenses::create(
            pool,
            NewExpense {
                expense_date: date.parse().unwrap(),
                category: category.to_string(),
                vendor: None,
                description: None,
                amount_cents: cents,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_budget_summary() {
        let pool = init_memory_database().await.unwrap();
        let unit_id = unit(&pool, "1A", 10_000).await;

        pay(&pool, Some(unit_id), "2025-01", RevenueSource::Dues, 10_000).await;
        pay(&pool, None, "2025-03", RevenueSource::Other, 2_500).await;
        pay(&pool, Some(unit_id), "2024-12", RevenueSource::Dues, 10_000).await;

        spend(&pool, "2025-01-15", "Utilities", 4_000).await;
        spend(&pool, "2025-03-02", "Repairs", 9_000).await;
        spend(&pool, "2024-11-30", "Repairs", 1_000).await;

        budget::upsert_line(&pool, 2025, "Utilities", 50_000).await.unwrap();
        budget::upsert_line(&pool, 2025, "Insurance", 20_000).await.unwrap();

        let summary = budget_summary(&pool, 2025).await.unwrap();
        assert_eq!(summary.revenue_cents, 12_500);
        assert_eq!(summary.expense_cents, 13_000);
        assert_eq!(summary.net_cents, -500);
        assert_eq!(summary.planned_expense_cents, 70_000);

        let names: Vec<&str> = summary.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Insurance", "Repairs", "Utilities"]);
        let repairs = &summary.categories[1];
        assert_eq!(repairs.planned_cents, 0);
        assert_eq!(repairs.actual_cents, 9_000);
        assert_eq!(repairs.variance_cents, -9_000);
        assert_eq!(summary.categories[2].variance_cents, 46_000);

        assert_eq!(summary.months.len(), 12);
        assert_eq!(summary.months[0].period, "2025-01");
        assert_eq!(summary.months[0].net_cents, 6_000);
        assert_eq!(summary.months[1].revenue_cents, 0);
        assert_eq!(summary.months[2].revenue_cents, 2_500);
        assert_eq!(summary.months[2].expense_cents, 9_000);
    }

    #[tokio::test]
    async fn test_empty_year_is_zero_filled() {
        let pool = init_memory_database().await.unwrap();
        let summary = budget_summary(&pool, 2030).await.unwrap();
        assert!(summary.categories.is_empty());
        assert_eq!(summary.months.len(), 12);
        assert!(summary.months.iter().all(|m| m.net_cents == 0));

        assert!(matches!(budget_summary(&pool, 99).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unit_balances_count_only_dues_in_range() {
        let pool = init_memory_database().await.unwrap();
        let a = unit(&pool, "1A", 10_000).await;
        let b = unit(&pool, "1B", 15_000).await;

        pay(&pool, Some(a), "2025-01", RevenueSource::Dues, 10_000).await;
        pay(&pool, Some(a), "2025-02", RevenueSource::Dues, 10_000).await;
        pay(&pool, Some(a), "2025-04", RevenueSource::Dues, 10_000).await;
        pay(&pool, Some(b), "2025-01", RevenueSource::SpecialAssessment, 50_000).await;

        let balances = unit_balances(&pool, 2025, 3).await.unwrap();
        assert_eq!(balances.len(), 2);

        assert_eq!(balances[0].unit_number, "1A");
        assert_eq!(balances[0].expected_cents, 30_000);
        assert_eq!(balances[0].paid_cents, 20_000);
        assert_eq!(balances[0].balance_cents, 10_000);

        assert_eq!(balances[1].paid_cents, 0);
        assert_eq!(balances[1].balance_cents, 45_000);

        assert!(matches!(unit_balances(&pool, 2025, 0).await, Err(Error::InvalidInput(_))));
        assert!(matches!(unit_balances(&pool, 2025, 13).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delinquent_units_sorted_with_active_contacts() {
        let pool = init_memory_database().await.unwrap();
        let small = unit(&pool, "1A", 10_000).await;
        let large = unit(&pool, "2A", 30_000).await;
        let paid_up = unit(&pool, "3A", 5_000).await;

        pay(&pool, Some(paid_up), "2025-01", RevenueSource::Dues, 5_000).await;

        for (unit_id, name, move_out) in [
            (large, "Current Owner", None),
            (large, "Old Tenant", NaiveDate::from_ymd_opt(2020, 1, 31)),
            (small, "Small Owner", None),
        ] {
            people::create(
                &pool,
                NewPerson {
                    unit_id,
                    role: if move_out.is_some() {
                        PersonRole::Tenant
                    } else {
                        PersonRole::Owner
                    },
                    full_name: name.to_string(),
                    email: None,
                    phone: Some("555-0101".to_string()),
                    move_in_date: NaiveDate::from_ymd_opt(2019, 1, 1),
                    move_out_date: move_out,
                },
            )
            .await
            .unwrap();
        }

        let delinquent = delinquent_units(&pool, 2025, 1, 0).await.unwrap();
        let numbers: Vec<&str> = delinquent
            .iter()
            .map(|d| d.balance.unit_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["2A", "1A"]);

        assert_eq!(delinquent[0].contacts.len(), 1);
        assert_eq!(delinquent[0].contacts[0].full_name, "Current Owner");

        let above_threshold = delinquent_units(&pool, 2025, 1, 10_000).await.unwrap();
        assert_eq!(above_threshold.len(), 1);

        let json = serde_json::to_value(&delinquent[0]).unwrap();
        assert_eq!(json["balance_cents"], 30_000);
        assert!(json["contacts"].is_array());
    }

    #[tokio::test]
    async fn test_largest_fee_reports_a_full_year() {
        let pool = init_memory_database().await.unwrap();
        unit(&pool, "PH", crate::money::MAX_AMOUNT_CENTS).await;

        let balances = unit_balances(&pool, 2025, 12).await.unwrap();
        assert_eq!(balances[0].expected_cents, crate::money::MAX_AMOUNT_CENTS * 12);
        assert_eq!(balances[0].balance_cents, crate::money::MAX_AMOUNT_CENTS * 12);
    }

    #[tokio::test]
    async fn test_oversized_stored_amounts_are_rejected_not_panicking() {
        let pool = init_memory_database().await.unwrap();

        // Rows written outside the repositories skip the amount cap
        sqlx::query(
            "INSERT INTO units (guid, unit_number, monthly_fee_cents) VALUES (?, '9Z', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(i64::MAX / 4)
        .execute(&pool)
        .await
        .unwrap();

        assert!(matches!(
            unit_balances(&pool, 2025, 12).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            delinquent_units(&pool, 2025, 12, 0).await,
            Err(Error::InvalidInput(_))
        ));

        for _ in 0..2 {
            sqlx::query(
                "INSERT INTO expenses (guid, expense_date, category, amount_cents) \
                 VALUES (?, '2025-06-01', 'Roof', ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(i64::MAX / 2 + 1)
            .execute(&pool)
            .await
            .unwrap();
        }

        assert!(matches!(
            budget_summary(&pool, 2025).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_amounts_above_cap_are_refused() {
        let pool = init_memory_database().await.unwrap();
        let result = units::create(
            &pool,
            NewUnit {
                unit_number: "1A".to_string(),
                floor: None,
                area_sqm: None,
                monthly_fee_cents: i64::MAX / 4,
                notes: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
