//! Generic persistence helpers shared by the entity repositories

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::page::{Page, PageRequest};
use crate::db::query_builder::{InsertBuilder, SelectBuilder, TableSpec, UpdateBuilder};
use crate::{Error, Result};

/// A row type stored in one table keyed by `guid`
pub trait Record: Sized + Send + Unpin {
    /// Column whitelist; `SELECT` and `RETURNING` use every column in order
    const TABLE: &'static TableSpec;

    /// Human-readable name used in error messages
    const LABEL: &'static str;

    fn from_row(row: &SqliteRow) -> Result<Self>;
}

/// Read a TEXT guid column as a Uuid
pub fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| Error::Internal(format!("Corrupt {} '{}': {}", column, raw, e)))
}

/// Read a nullable TEXT guid column
pub fn opt_uuid_column(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Uuid::parse_str(&s).map_err(|e| Error::Internal(format!("Corrupt {} '{}': {}", column, s, e)))
    })
    .transpose()
}

/// Run a filtered select, counting first so the page can be clamped
pub async fn fetch_page<R: Record>(
    pool: &SqlitePool,
    select: SelectBuilder<'_>,
    request: PageRequest,
) -> Result<Page<R>> {
    let total = select.build_count().query_scalar().fetch_one(pool).await?;
    let pagination = request.resolve(total);

    let query = select.paginate(pagination.page_size, pagination.offset).build();
    let rows = query.query().fetch_all(pool).await?;
    let items = rows.iter().map(R::from_row).collect::<Result<Vec<_>>>()?;

    Ok(Page::new(items, total, pagination))
}

/// Load one record by guid
pub async fn fetch_one<'e, R, E>(executor: E, id: Uuid) -> Result<Option<R>>
where
    R: Record,
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        R::TABLE.column_list(),
        R::TABLE.name,
        R::TABLE.key
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(R::from_row).transpose()
}

/// Load one record by guid, failing with `NotFound`
pub async fn require<'e, R, E>(executor: E, id: Uuid) -> Result<R>
where
    R: Record,
    E: SqliteExecutor<'e>,
{
    fetch_one(executor, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", R::LABEL, id)))
}

/// Execute an insert and decode the returned row
pub async fn insert<'e, R, E>(executor: E, insert: InsertBuilder<'_>) -> Result<R>
where
    R: Record,
    E: SqliteExecutor<'e>,
{
    let query = insert.build()?;
    let row = query
        .query()
        .fetch_one(executor)
        .await
        .map_err(Error::from_write)?;
    R::from_row(&row)
}

/// Execute a partial update of the record with the given guid
pub async fn update<R: Record>(
    pool: &SqlitePool,
    id: Uuid,
    update: UpdateBuilder<'_>,
) -> Result<R> {
    if update.is_empty() {
        return Err(Error::InvalidInput("No fields to update".to_string()));
    }
    let query = update.where_eq(R::TABLE.key, id)?.build()?;
    let row = query
        .query()
        .fetch_optional(pool)
        .await
        .map_err(Error::from_write)?
        .ok_or_else(|| Error::NotFound(format!("{} {}", R::LABEL, id)))?;
    R::from_row(&row)
}

/// Delete the record with the given guid
pub async fn delete<R: Record>(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE {} = ?", R::TABLE.name, R::TABLE.key);
    let result = sqlx::query(&sql)
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(Error::from_write)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} {}", R::LABEL, id)));
    }
    Ok(())
}

/// Trim a text value, mapping blank to `None`
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim a required text value, rejecting blank input
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}
