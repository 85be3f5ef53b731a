//! Owner and tenant database operations

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
use crate::db::record::{self, clean_text, require_text, uuid_column, Record};
use crate::serde_utils::double_option;
use crate::{Error, Result};

pub const PEOPLE_TABLE: TableSpec = TableSpec {
    name: "people",
    key: "guid",
    columns: &[
        "guid",
        "unit_id",
        "role",
        "full_name",
        "email",
        "phone",
        "move_in_date",
        "move_out_date",
        "created_at",
        "updated_at",
    ],
    default_sort: "full_name",
};

/// Relationship of a person to a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Owner,
    Tenant,
}

impl PersonRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonRole::Owner => "owner",
            PersonRole::Tenant => "tenant",
        }
    }
}

impl fmt::Display for PersonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(PersonRole::Owner),
            "tenant" => Ok(PersonRole::Tenant),
            other => Err(Error::InvalidInput(format!(
                "Invalid role '{}' (expected owner or tenant)",
                other
            ))),
        }
    }
}

/// Person record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Person {
    pub guid: Uuid,
    pub unit_id: Uuid,
    pub role: PersonRole,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub move_in_date: Option<NaiveDate>,
    pub move_out_date: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

impl Person {
    /// Still living in / owning the unit on the given day
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.move_out_date.map_or(true, |out| out >= day)
    }
}

impl Record for Person {
    const TABLE: &'static TableSpec = &PEOPLE_TABLE;
    const LABEL: &'static str = "Person";

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            guid: uuid_column(row, "guid")?,
            unit_id: uuid_column(row, "unit_id")?,
            role: role.parse()?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            move_in_date: row.try_get("move_in_date")?,
            move_out_date: row.try_get("move_out_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Create payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
    pub unit_id: Uuid,
    pub role: PersonRole,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub move_in_date: Option<NaiveDate>,
    #[serde(default)]
    pub move_out_date: Option<NaiveDate>,
}

impl NewPerson {
    pub fn validated(self) -> Result<Self> {
        let email = clean_text(self.email);
        validate_email(email.as_deref())?;
        validate_dates(self.move_in_date, self.move_out_date)?;
        Ok(Self {
            unit_id: self.unit_id,
            role: self.role,
            full_name: require_text("full_name", &self.full_name)?,
            email,
            phone: clean_text(self.phone),
            move_in_date: self.move_in_date,
            move_out_date: self.move_out_date,
        })
    }
}

/// Partial update payload; `null` clears nullable columns
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonPatch {
    #[serde(default)]
    pub unit_id: Option<Uuid>,
    #[serde(default)]
    pub role: Option<PersonRole>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub move_in_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub move_out_date: Option<Option<NaiveDate>>,
}

/// Listing filter (query string)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonFilter {
    pub unit_id: Option<Uuid>,
    pub role: Option<PersonRole>,
    /// `true`: not moved out as of today; `false`: moved out before today
    pub active: Option<bool>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

fn validate_email(email: Option<&str>) -> Result<()> {
    match email {
        Some(e) if !e.contains('@') => {
            Err(Error::InvalidInput(format!("Invalid email address: {}", e)))
        }
        _ => Ok(()),
    }
}

fn validate_dates(move_in: Option<NaiveDate>, move_out: Option<NaiveDate>) -> Result<()> {
    if let (Some(move_in), Some(move_out)) = (move_in, move_out) {
        if move_out < move_in {
            return Err(Error::InvalidInput(format!(
                "move_out_date {} is before move_in_date {}",
                move_out, move_in
            )));
        }
    }
    Ok(())
}

/// List people
pub async fn list(pool: &SqlitePool, filter: &PersonFilter) -> Result<Page<Person>> {
    let today = crate::time::today();
    let mut select = SelectBuilder::new(&PEOPLE_TABLE)
        .filter_opt("unit_id", FilterOp::Eq, filter.unit_id)?
        .filter_opt("role", FilterOp::Eq, filter.role.map(PersonRole::as_str))?
        .search(&["full_name", "email", "phone"], filter.q.as_deref())?;

    select = match filter.active {
        Some(true) => select.filter_null_or("move_out_date", FilterOp::Gte, today)?,
        Some(false) => select.filter("move_out_date", FilterOp::Lt, today)?,
        None => select,
    };

    let select = select
        .order_by_opt(filter.sort.as_deref(), SortOrder::from_param(filter.order.as_deref()))?;

    record::fetch_page(pool, select, PageRequest::new(filter.page, filter.page_size)).await
}

/// Everyone attached to a unit, owners first
pub async fn list_for_unit(pool: &SqlitePool, unit_id: Uuid) -> Result<Vec<Person>> {
    let sql = format!(
        "SELECT {} FROM people WHERE unit_id = ? ORDER BY role ASC, full_name ASC",
        PEOPLE_TABLE.column_list()
    );
    let rows = sqlx::query(&sql)
        .bind(unit_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(Person::from_row).collect()
}

/// Load person by guid
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Person> {
    record::require(pool, id).await
}

/// Save new person
pub async fn create<'e, E>(executor: E, new: NewPerson) -> Result<Person>
where
    E: SqliteExecutor<'e>,
{
    let new = new.validated()?;
    let insert = InsertBuilder::new(&PEOPLE_TABLE)
        .value("guid", Uuid::new_v4())?
        .value("unit_id", new.unit_id)?
        .value("role", new.role.as_str())?
        .value("full_name", new.full_name)?
        .value("email", new.email)?
        .value("phone", new.phone)?
        .value("move_in_date", new.move_in_date)?
        .value("move_out_date", new.move_out_date)?;

    record::insert(executor, insert).await
}

/// Apply a partial update
pub async fn update(pool: &SqlitePool, id: Uuid, patch: PersonPatch) -> Result<Person> {
    let current = get(pool, id).await?;

    let move_in = patch.move_in_date.unwrap_or(current.move_in_date);
    let move_out = patch.move_out_date.unwrap_or(current.move_out_date);
    validate_dates(move_in, move_out)?;

    let full_name = patch
        .full_name
        .as_deref()
        .map(|n| require_text("full_name", n))
        .transpose()?;
    let email = patch.email.map(clean_text);
    if let Some(e) = &email {
        validate_email(e.as_deref())?;
    }

    let update = UpdateBuilder::new(&PEOPLE_TABLE)
        .set_opt("unit_id", patch.unit_id)?
        .set_opt("role", patch.role.map(PersonRole::as_str))?
        .set_opt("full_name", full_name)?
        .set_opt("email", email)?
        .set_opt("phone", patch.phone.map(clean_text))?
        .set_opt("move_in_date", patch.move_in_date)?
        .set_opt("move_out_date", patch.move_out_date)?;

    record::update(pool, id, update).await
}

/// Delete person
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<()> {
    record::delete::<Person>(pool, id).await
}
