//! Dynamic SQL assembly for filtered listings and partial updates
//!
//! Request parameters are turned into `SELECT` / `INSERT` / `UPDATE`
//! statements whose identifiers come only from a [`TableSpec`] whitelist.
//! Values always travel as bound parameters, never as SQL text.
//!
//! ```
//! use condo_common::db::query_builder::{FilterOp, SelectBuilder, SortOrder, TableSpec};
//!
//! const EXPENSES: TableSpec = TableSpec {
//!     name: "expenses",
//!     key: "guid",
//!     columns: &["guid", "category", "amount_cents"],
//!     default_sort: "category",
//! };
//!
//! let query = SelectBuilder::new(&EXPENSES)
//!     .filter("category", FilterOp::Eq, "water").unwrap()
//!     .filter_opt("amount_cents", FilterOp::Gte, Some(500i64)).unwrap()
//!     .order_by("amount_cents", SortOrder::Desc).unwrap()
//!     .build();
//!
//! assert_eq!(
//!     query.sql,
//!     "SELECT guid, category, amount_cents FROM expenses \
//!      WHERE category = ? AND amount_cents >= ? \
//!      ORDER BY amount_cents DESC, guid ASC"
//! );
//! assert_eq!(query.params.len(), 2);
//! ```

use chrono::NaiveDate;
use sqlx::query::{Query, QueryScalar};
use sqlx::sqlite::{Sqlite, SqliteArguments};
use thiserror::Error;
use uuid::Uuid;

/// Query builder misuse
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Nothing to write to table '{0}'")]
    EmptyStatement(&'static str),

    #[error("Refusing to update '{0}' without a WHERE clause")]
    MissingWhere(&'static str),
}

/// A bindable SQLite value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Text(v.format("%Y-%m-%d").to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Escape LIKE wildcards so user input matches literally (`ESCAPE '\'`)
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Identifier whitelist for one table
#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    /// Primary key column, used as the stable sort tiebreak
    pub key: &'static str,
    pub columns: &'static [&'static str],
    pub default_sort: &'static str,
}

impl TableSpec {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    /// Comma-separated column list for SELECT / RETURNING
    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }

    fn checked(&self, column: &str) -> Result<&'static str, QueryError> {
        self.columns
            .iter()
            .find(|c| **c == column)
            .copied()
            .ok_or_else(|| QueryError::UnknownColumn {
                table: self.name,
                column: column.to_string(),
            })
    }
}

/// Comparison operator for a WHERE condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl FilterOp {
    fn as_sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Like => "LIKE",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse a request parameter; anything other than `desc` sorts ascending
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// An assembled statement and its parameters, in binding order
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl DynamicQuery {
    /// Prepare the statement with every parameter bound
    pub fn query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for param in &self.params {
            query = match param {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Real(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
            };
        }
        query
    }

    /// Prepare a single-column scalar query (e.g. `COUNT(*)`)
    pub fn query_scalar(&self) -> QueryScalar<'_, Sqlite, i64, SqliteArguments<'_>> {
        let mut query = sqlx::query_scalar(&self.sql);
        for param in &self.params {
            query = match param {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Real(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
            };
        }
        query
    }
}

/// Filtered, sorted, paginated SELECT
#[derive(Debug)]
pub struct SelectBuilder<'t> {
    table: &'t TableSpec,
    conditions: Vec<String>,
    params: Vec<SqlValue>,
    order: Option<(&'static str, SortOrder)>,
    page: Option<(i64, i64)>,
}

impl<'t> SelectBuilder<'t> {
    pub fn new(table: &'t TableSpec) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            params: Vec::new(),
            order: None,
            page: None,
        }
    }

    /// Add `column <op> ?`
    pub fn filter(
        mut self,
        column: &str,
        op: FilterOp,
        value: impl Into<SqlValue>,
    ) -> Result<Self, QueryError> {
        let column = self.table.checked(column)?;
        self.conditions.push(format!("{} {} ?", column, op.as_sql()));
        self.params.push(value.into());
        Ok(self)
    }

    /// Add `column <op> ?` only when a value is present
    pub fn filter_opt<V: Into<SqlValue>>(
        self,
        column: &str,
        op: FilterOp,
        value: Option<V>,
    ) -> Result<Self, QueryError> {
        match value {
            Some(v) => self.filter(column, op, v),
            None => {
                self.table.checked(column)?;
                Ok(self)
            }
        }
    }

    /// Add `(column IS NULL OR column <op> ?)`
    pub fn filter_null_or(
        mut self,
        column: &str,
        op: FilterOp,
        value: impl Into<SqlValue>,
    ) -> Result<Self, QueryError> {
        let column = self.table.checked(column)?;
        self.conditions
            .push(format!("({} IS NULL OR {} {} ?)", column, column, op.as_sql()));
        self.params.push(value.into());
        Ok(self)
    }

    /// Add `(a LIKE ? OR b LIKE ?)` matching `%term%`; blank terms add nothing
    ///
    /// `%`, `_` and `\` in the term match literally.
    pub fn search(mut self, columns: &[&str], term: Option<&str>) -> Result<Self, QueryError> {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(self),
        };
        let pattern = format!("%{}%", escape_like(term));
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            let column = self.table.checked(column)?;
            parts.push(format!("{} LIKE ? ESCAPE '\\'", column));
            self.params.push(SqlValue::Text(pattern.clone()));
        }
        if !parts.is_empty() {
            self.conditions.push(format!("({})", parts.join(" OR ")));
        }
        Ok(self)
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Result<Self, QueryError> {
        let column = self.table.checked(column)?;
        self.order = Some((column, order));
        Ok(self)
    }

    /// Apply an optional request sort column, falling back to the default
    pub fn order_by_opt(self, column: Option<&str>, order: SortOrder) -> Result<Self, QueryError> {
        match column.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => self.order_by(c, order),
            None => {
                let default = self.table.default_sort;
                self.order_by(default, order)
            }
        }
    }

    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.page = Some((limit, offset));
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn build(&self) -> DynamicQuery {
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            self.table.column_list(),
            self.table.name,
            self.where_clause()
        );

        let (column, order) = self.order.unwrap_or((self.table.default_sort, SortOrder::Asc));
        sql.push_str(&format!(" ORDER BY {} {}", column, order.as_sql()));
        if column != self.table.key {
            sql.push_str(&format!(", {} ASC", self.table.key));
        }

        let mut params = self.params.clone();
        if let Some((limit, offset)) = self.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(limit));
            params.push(SqlValue::Integer(offset));
        }

        DynamicQuery { sql, params }
    }

    /// `SELECT COUNT(*)` with the same conditions, ignoring order and paging
    pub fn build_count(&self) -> DynamicQuery {
        DynamicQuery {
            sql: format!("SELECT COUNT(*) FROM {}{}", self.table.name, self.where_clause()),
            params: self.params.clone(),
        }
    }
}

/// `INSERT ... RETURNING` with whitelisted columns
#[derive(Debug)]
pub struct InsertBuilder<'t> {
    table: &'t TableSpec,
    columns: Vec<&'static str>,
    params: Vec<SqlValue>,
}

impl<'t> InsertBuilder<'t> {
    pub fn new(table: &'t TableSpec) -> Self {
        Self {
            table,
            columns: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn value(mut self, column: &str, value: impl Into<SqlValue>) -> Result<Self, QueryError> {
        let column = self.table.checked(column)?;
        self.columns.push(column);
        self.params.push(value.into());
        Ok(self)
    }

    pub fn build(&self) -> Result<DynamicQuery, QueryError> {
        if self.columns.is_empty() {
            return Err(QueryError::EmptyStatement(self.table.name));
        }
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        Ok(DynamicQuery {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                self.table.name,
                self.columns.join(", "),
                placeholders,
                self.table.column_list()
            ),
            params: self.params.clone(),
        })
    }
}

/// `UPDATE ... RETURNING` touching only the columns that were set
#[derive(Debug)]
pub struct UpdateBuilder<'t> {
    table: &'t TableSpec,
    assignments: Vec<String>,
    set_params: Vec<SqlValue>,
    conditions: Vec<String>,
    where_params: Vec<SqlValue>,
}

impl<'t> UpdateBuilder<'t> {
    pub fn new(table: &'t TableSpec) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            set_params: Vec::new(),
            conditions: Vec::new(),
            where_params: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<SqlValue>) -> Result<Self, QueryError> {
        let column = self.table.checked(column)?;
        self.assignments.push(format!("{} = ?", column));
        self.set_params.push(value.into());
        Ok(self)
    }

    /// Set the column only when a value is present
    pub fn set_opt<V: Into<SqlValue>>(
        self,
        column: &str,
        value: Option<V>,
    ) -> Result<Self, QueryError> {
        match value {
            Some(v) => self.set(column, v),
            None => Ok(self),
        }
    }

    pub fn where_eq(mut self, column: &str, value: impl Into<SqlValue>) -> Result<Self, QueryError> {
        let column = self.table.checked(column)?;
        self.conditions.push(format!("{} = ?", column));
        self.where_params.push(value.into());
        Ok(self)
    }

    /// True when no column has been set yet
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn build(&self) -> Result<DynamicQuery, QueryError> {
        if self.assignments.is_empty() {
            return Err(QueryError::EmptyStatement(self.table.name));
        }
        if self.conditions.is_empty() {
            return Err(QueryError::MissingWhere(self.table.name));
        }

        let mut assignments = self.assignments.clone();
        if self.table.has_column("updated_at") {
            assignments.push("updated_at = CURRENT_TIMESTAMP".to_string());
        }

        let mut params = self.set_params.clone();
        params.extend(self.where_params.iter().cloned());

        Ok(DynamicQuery {
            sql: format!(
                "UPDATE {} SET {} WHERE {} RETURNING {}",
                self.table.name,
                assignments.join(", "),
                self.conditions.join(" AND "),
                self.table.column_list()
            ),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    const ITEMS: TableSpec = TableSpec {
        name: "items",
        key: "guid",
        columns: &["guid", "label", "amount_cents", "closed_on", "updated_at"],
        default_sort: "label",
    };

    #[test]
    fn test_select_without_filters_uses_default_sort() {
        let query = SelectBuilder::new(&ITEMS).build();
        assert_eq!(
            query.sql,
            "SELECT guid, label, amount_cents, closed_on, updated_at FROM items \
             ORDER BY label ASC, guid ASC"
        );
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_filters_keep_parameter_order() {
        let query = SelectBuilder::new(&ITEMS)
            .filter("label", FilterOp::Eq, "rent")
            .unwrap()
            .filter_opt::<i64>("amount_cents", FilterOp::Gte, None)
            .unwrap()
            .filter_opt("amount_cents", FilterOp::Lte, Some(900i64))
            .unwrap()
            .paginate(10, 20)
            .build();

        assert_eq!(
            query.sql,
            "SELECT guid, label, amount_cents, closed_on, updated_at FROM items \
             WHERE label = ? AND amount_cents <= ? \
             ORDER BY label ASC, guid ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            query.params,
            vec![
                SqlValue::Text("rent".to_string()),
                SqlValue::Integer(900),
                SqlValue::Integer(10),
                SqlValue::Integer(20),
            ]
        );
    }

    #[test]
    fn test_count_ignores_order_and_paging() {
        let builder = SelectBuilder::new(&ITEMS)
            .filter("label", FilterOp::Ne, "x")
            .unwrap()
            .order_by("amount_cents", SortOrder::Desc)
            .unwrap()
            .paginate(5, 0);

        let count = builder.build_count();
        assert_eq!(count.sql, "SELECT COUNT(*) FROM items WHERE label <> ?");
        assert_eq!(count.params, vec![SqlValue::Text("x".to_string())]);
    }

    #[test]
    fn test_unknown_columns_are_rejected() {
        let err = SelectBuilder::new(&ITEMS)
            .filter("label; DROP TABLE items", FilterOp::Eq, "x")
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { .. }));

        assert!(SelectBuilder::new(&ITEMS)
            .order_by("nope", SortOrder::Asc)
            .is_err());
        assert!(SelectBuilder::new(&ITEMS)
            .filter_opt::<i64>("nope", FilterOp::Eq, None)
            .is_err());
        assert!(InsertBuilder::new(&ITEMS).value("nope", 1i64).is_err());
        assert!(UpdateBuilder::new(&ITEMS).set("nope", 1i64).is_err());
    }

    #[test]
    fn test_search_and_null_or() {
        let query = SelectBuilder::new(&ITEMS)
            .search(&["label", "guid"], Some(" gas "))
            .unwrap()
            .search(&["label"], Some("   "))
            .unwrap()
            .filter_null_or("closed_on", FilterOp::Gte, "2026-01-01")
            .unwrap()
            .build();

        assert!(query
            .sql
            .contains("WHERE (label LIKE ? ESCAPE '\\' OR guid LIKE ? ESCAPE '\\') AND (closed_on IS NULL OR closed_on >= ?)"));
        assert_eq!(query.params[0], SqlValue::Text("%gas%".to_string()));
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn test_search_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");

        let query = SelectBuilder::new(&ITEMS)
            .search(&["label"], Some("%"))
            .unwrap()
            .build();
        assert_eq!(query.params[0], SqlValue::Text("%\\%%".to_string()));
    }

    #[test]
    fn test_sort_by_key_has_no_tiebreak() {
        let query = SelectBuilder::new(&ITEMS)
            .order_by_opt(Some("guid"), SortOrder::from_param(Some("DESC")))
            .unwrap()
            .build();
        assert!(query.sql.ends_with("ORDER BY guid DESC"));
    }

    #[test]
    fn test_sort_order_param() {
        assert_eq!(SortOrder::from_param(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(Some("Desc")), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(Some("sideways")), SortOrder::Asc);
        assert_eq!(SortOrder::from_param(None), SortOrder::Asc);
    }

    #[test]
    fn test_insert_statement() {
        let query = InsertBuilder::new(&ITEMS)
            .value("guid", "g-1")
            .unwrap()
            .value("amount_cents", 250i64)
            .unwrap()
            .value("closed_on", None::<String>)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "INSERT INTO items (guid, amount_cents, closed_on) VALUES (?, ?, ?) \
             RETURNING guid, label, amount_cents, closed_on, updated_at"
        );
        assert_eq!(query.params[2], SqlValue::Null);
        assert_eq!(
            InsertBuilder::new(&ITEMS).build().unwrap_err(),
            QueryError::EmptyStatement("items")
        );
    }

    #[test]
    fn test_update_statement() {
        let query = UpdateBuilder::new(&ITEMS)
            .set_opt("label", Some("water"))
            .unwrap()
            .set_opt::<i64>("amount_cents", None)
            .unwrap()
            .where_eq("guid", "g-1")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            query.sql,
            "UPDATE items SET label = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ? \
             RETURNING guid, label, amount_cents, closed_on, updated_at"
        );
        assert_eq!(
            query.params,
            vec![
                SqlValue::Text("water".to_string()),
                SqlValue::Text("g-1".to_string())
            ]
        );
    }

    #[test]
    fn test_update_guards() {
        let empty = UpdateBuilder::new(&ITEMS).where_eq("guid", "g-1").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.build().unwrap_err(), QueryError::EmptyStatement("items"));

        let no_where = UpdateBuilder::new(&ITEMS).set("label", "x").unwrap();
        assert_eq!(no_where.build().unwrap_err(), QueryError::MissingWhere("items"));
    }

    #[test]
    fn test_value_conversions() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        assert_eq!(SqlValue::from(date), SqlValue::Text("2026-02-03".to_string()));
        assert_eq!(SqlValue::from(Some(7i32)), SqlValue::Integer(7));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(1.5f64), SqlValue::Real(1.5));
    }

    #[tokio::test]
    async fn test_statements_execute_against_sqlite() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::query(
            "CREATE TABLE items (
                guid TEXT PRIMARY KEY,
                label TEXT,
                amount_cents INTEGER,
                closed_on TEXT,
                updated_at TEXT
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        for (guid, label, amount) in [("a", "gas", 100i64), ("b", "gas", 300), ("c", "water", 200)] {
            let insert = InsertBuilder::new(&ITEMS)
                .value("guid", guid)
                .unwrap()
                .value("label", label)
                .unwrap()
                .value("amount_cents", amount)
                .unwrap()
                .build()
                .unwrap();
            let row = insert.query().fetch_one(&pool).await.unwrap();
            assert_eq!(row.get::<String, _>("guid"), guid);
        }

        let select = SelectBuilder::new(&ITEMS)
            .filter("label", FilterOp::Eq, "gas")
            .unwrap()
            .order_by("amount_cents", SortOrder::Desc)
            .unwrap();

        let total = select.build_count().query_scalar().fetch_one(&pool).await.unwrap();
        assert_eq!(total, 2);

        let rows = select.build().query().fetch_all(&pool).await.unwrap();
        let guids: Vec<String> = rows.iter().map(|r| r.get("guid")).collect();
        assert_eq!(guids, vec!["b".to_string(), "a".to_string()]);

        let update = UpdateBuilder::new(&ITEMS)
            .set("amount_cents", 350i64)
            .unwrap()
            .where_eq("guid", "c")
            .unwrap()
            .build()
            .unwrap();
        let row = update.query().fetch_one(&pool).await.unwrap();
        assert_eq!(row.get::<i64, _>("amount_cents"), 350);
        assert!(row.get::<Option<String>, _>("updated_at").is_some());

        let insert = InsertBuilder::new(&ITEMS)
            .value("guid", "d")
            .unwrap()
            .value("label", "50% off_sale")
            .unwrap()
            .build()
            .unwrap();
        insert.query().fetch_one(&pool).await.unwrap();

        for (term, expected) in [("%", vec!["d"]), ("_", vec!["d"]), ("% off_", vec!["d"]), ("5_", vec![])] {
            let select = SelectBuilder::new(&ITEMS)
                .search(&["label"], Some(term))
                .unwrap();
            let rows = select.build().query().fetch_all(&pool).await.unwrap();
            let guids: Vec<String> = rows.iter().map(|r| r.get("guid")).collect();
            assert_eq!(guids, expected, "search term {:?}", term);
        }
    }
}
