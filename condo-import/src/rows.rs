//! Typed CSV rows and how each one is written

use std::future::Future;

use condo_common::db::budget;
use condo_common::db::expenses::{self, NewExpense};
use condo_common::db::people::{self, NewPerson, PersonRole};
use condo_common::db::revenue::{self, NewRevenue, RevenueSource};
use condo_common::db::units::{self, NewUnit};
use condo_common::money::parse_cents;
use condo_common::time::parse_date;
use condo_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// A CSV row that can be validated and inserted
pub trait ImportRow: DeserializeOwned {
    /// Columns that must be present in the header
    const REQUIRED_COLUMNS: &'static [&'static str];

    fn insert(self, conn: &mut SqliteConnection) -> impl Future<Output = Result<()>>;
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_opt<T: std::str::FromStr>(field: &str, value: Option<String>) -> Result<Option<T>> {
    blank_to_none(value)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| Error::InvalidInput(format!("Invalid {}: {}", field, v)))
        })
        .transpose()
}

async fn lookup_unit(conn: &mut SqliteConnection, unit_number: &str) -> Result<Uuid> {
    units::find_by_number(&mut *conn, unit_number)
        .await?
        .map(|unit| unit.guid)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown unit '{}'", unit_number.trim())))
}

/// `unit_number,floor,area_sqm,monthly_fee,notes`
#[derive(Debug, Deserialize)]
pub struct UnitRow {
    pub unit_number: String,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub area_sqm: Option<String>,
    pub monthly_fee: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ImportRow for UnitRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["unit_number", "monthly_fee"];

    async fn insert(self, conn: &mut SqliteConnection) -> Result<()> {
        let new = NewUnit {
            unit_number: self.unit_number,
            floor: parse_opt("floor", self.floor)?,
            area_sqm: parse_opt("area_sqm", self.area_sqm)?,
            monthly_fee_cents: parse_cents(&self.monthly_fee)?,
            notes: self.notes,
        };
        units::create(&mut *conn, new).await?;
        Ok(())
    }
}

/// `unit_number,role,full_name,email,phone,move_in_date,move_out_date`
#[derive(Debug, Deserialize)]
pub struct PersonRow {
    pub unit_number: String,
    pub role: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub move_in_date: Option<String>,
    #[serde(default)]
    pub move_out_date: Option<String>,
}

impl ImportRow for PersonRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["unit_number", "role", "full_name"];

    async fn insert(self, conn: &mut SqliteConnection) -> Result<()> {
        let role: PersonRole = self.role.parse()?;
        let move_in_date = blank_to_none(self.move_in_date)
            .map(|d| parse_date(&d))
            .transpose()?;
        let move_out_date = blank_to_none(self.move_out_date)
            .map(|d| parse_date(&d))
            .transpose()?;

        let new = NewPerson {
            unit_id: lookup_unit(conn, &self.unit_number).await?,
            role,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            move_in_date,
            move_out_date,
        };
        people::create(&mut *conn, new).await?;
        Ok(())
    }
}

/// `date,category,vendor,description,amount`
#[derive(Debug, Deserialize)]
pub struct ExpenseRow {
    pub date: String,
    pub category: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: String,
}

impl ImportRow for ExpenseRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["date", "category", "amount"];

    async fn insert(self, conn: &mut SqliteConnection) -> Result<()> {
        let new = NewExpense {
            expense_date: parse_date(&self.date)?,
            category: self.category,
            vendor: self.vendor,
            description: self.description,
            amount_cents: parse_cents(&self.amount)?,
        };
        expenses::create(&mut *conn, new).await?;
        Ok(())
    }
}

/// `date,unit_number,period,source,method,amount,notes`
///
/// An empty `unit_number` records building-level income.
#[derive(Debug, Deserialize)]
pub struct RevenueRow {
    pub date: String,
    #[serde(default)]
    pub unit_number: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    pub amount: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ImportRow for RevenueRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["date", "amount"];

    async fn insert(self, conn: &mut SqliteConnection) -> Result<()> {
        let unit_id = match blank_to_none(self.unit_number) {
            Some(number) => Some(lookup_unit(conn, &number).await?),
            None => None,
        };
        let source = blank_to_none(self.source)
            .map(|s| s.parse::<RevenueSource>())
            .transpose()?
            .unwrap_or_default();

        let new = NewRevenue {
            unit_id,
            payment_date: parse_date(&self.date)?,
            period: self.period,
            source,
            method: self.method,
            amount_cents: parse_cents(&self.amount)?,
            notes: self.notes,
        };
        revenue::create(&mut *conn, new).await?;
        Ok(())
    }
}

/// `year,category,planned`; a repeated (year, category) replaces the amount
#[derive(Debug, Deserialize)]
pub struct BudgetRow {
    pub year: String,
    pub category: String,
    pub planned: String,
}

impl ImportRow for BudgetRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["year", "category", "planned"];

    async fn insert(self, conn: &mut SqliteConnection) -> Result<()> {
        let year: i32 = self
            .year
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Invalid year: {}", self.year)))?;
        budget::upsert_line(&mut *conn, year, &self.category, parse_cents(&self.planned)?).await?;
        Ok(())
    }
}
