//! condo-import library - CSV import into the condo ledger database
//!
//! Each file holds one kind of record. All rows of a file are inserted in a
//! single transaction; each row runs inside its own savepoint so a rejected
//! row can be skipped without losing the rest.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use clap::ValueEnum;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use sqlx::{Connection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod rows;

use rows::{BudgetRow, ExpenseRow, ImportRow, PersonRow, RevenueRow, UnitRow};

/// Kind of records in a CSV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Units,
    People,
    Expenses,
    Revenue,
    Budget,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::Units => "units",
            ImportKind::People => "people",
            ImportKind::Expenses => "expenses",
            ImportKind::Revenue => "revenue",
            ImportKind::Budget => "budget",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Validate and insert, then roll back
    pub dry_run: bool,
    /// Log and count invalid rows instead of aborting
    pub skip_invalid: bool,
}

/// One rejected row
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    /// 1-based line in the CSV file (the header is line 1)
    pub line: u64,
    pub message: String,
}

/// Outcome of importing one file
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub kind: ImportKind,
    pub rows_read: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub errors: Vec<RowError>,
    pub dry_run: bool,
}

impl ImportSummary {
    fn new(kind: ImportKind, dry_run: bool) -> Self {
        Self {
            kind,
            rows_read: 0,
            inserted: 0,
            skipped: 0,
            errors: Vec::new(),
            dry_run,
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column(s): {0}")]
    MissingColumns(String),

    /// First invalid row when `skip_invalid` is off; nothing was committed
    #[error("Line {line}: {message}")]
    Row { line: u64, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Import a CSV file
pub async fn import_file(
    pool: &SqlitePool,
    kind: ImportKind,
    path: &Path,
    options: ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Open {
        path: path.display().to_string(),
        source,
    })?;
    info!("Importing {} from {}", kind.as_str(), path.display());
    import_reader(pool, kind, file, options).await
}

/// Import CSV data from any reader
pub async fn import_reader<R: Read>(
    pool: &SqlitePool,
    kind: ImportKind,
    reader: R,
    options: ImportOptions,
) -> Result<ImportSummary, ImportError> {
    match kind {
        ImportKind::Units => import_rows::<UnitRow, _>(pool, kind, reader, options).await,
        ImportKind::People => import_rows::<PersonRow, _>(pool, kind, reader, options).await,
        ImportKind::Expenses => import_rows::<ExpenseRow, _>(pool, kind, reader, options).await,
        ImportKind::Revenue => import_rows::<RevenueRow, _>(pool, kind, reader, options).await,
        ImportKind::Budget => import_rows::<BudgetRow, _>(pool, kind, reader, options).await,
    }
}

/// Lower-cased header row, checked against the row type's required columns
fn read_headers<R: Read, T: ImportRow>(
    csv_reader: &mut csv::Reader<R>,
) -> Result<StringRecord, ImportError> {
    let headers: StringRecord = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let missing: Vec<&str> = T::REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing.join(", ")));
    }

    csv_reader.set_headers(headers.clone());
    Ok(headers)
}

async fn import_rows<T: ImportRow, R: Read>(
    pool: &SqlitePool,
    kind: ImportKind,
    reader: R,
    options: ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(false)
        .from_reader(reader);
    let headers = read_headers::<R, T>(&mut csv_reader)?;

    let mut summary = ImportSummary::new(kind, options.dry_run);
    let mut tx = pool.begin().await?;

    for (index, result) in csv_reader.records().enumerate() {
        summary.rows_read += 1;
        // Fallback assumes one physical line per record after the header
        let fallback_line = index as u64 + 2;

        let outcome = match result {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |p| p.line());
                match record.deserialize::<T>(Some(&headers)) {
                    Ok(row) => {
                        let mut savepoint = tx.begin().await?;
                        match row.insert(&mut savepoint).await {
                            Ok(()) => {
                                savepoint.commit().await?;
                                Ok(())
                            }
                            Err(e) => {
                                savepoint.rollback().await?;
                                Err((line, e.to_string()))
                            }
                        }
                    }
                    Err(e) => Err((line, format!("Invalid row: {}", e))),
                }
            }
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                Err((line, e.to_string()))
            }
        };

        match outcome {
            Ok(()) => {
                summary.inserted += 1;
                debug!("Imported {} row {}", kind.as_str(), summary.rows_read);
            }
            Err((line, message)) if options.skip_invalid => {
                warn!("Skipping line {}: {}", line, message);
                summary.skipped += 1;
                summary.errors.push(RowError { line, message });
            }
            Err((line, message)) => {
                tx.rollback().await?;
                warn!("Import aborted at line {}; no rows were written", line);
                return Err(ImportError::Row { line, message });
            }
        }
    }

    if options.dry_run {
        tx.rollback().await?;
        info!("Dry run: rolled back {} {} rows", summary.inserted, kind.as_str());
    } else {
        tx.commit().await?;
    }

    info!(
        "Import {} finished: {} read, {} inserted, {} skipped{}",
        kind.as_str(),
        summary.rows_read,
        summary.inserted,
        summary.skipped,
        if options.dry_run { " (dry run)" } else { "" }
    );
    Ok(summary)
}
