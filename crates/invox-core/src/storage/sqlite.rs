//! Invoice store backed by SQLite.
//!
//! Dates are stored as `YYYY-MM-DD` text and amounts as decimal text so both
//! round-trip exactly. Absent values are `NULL`.

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{FileExistsCounts, InvoiceStore};
use crate::error::DbError;
use crate::models::invoice::{ContentHash, InvoicePatch, InvoiceRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS invoices (
    content_hash       TEXT PRIMARY KEY NOT NULL,
    original_file_name TEXT NOT NULL,
    external_id        TEXT,
    invoice_date       TEXT,
    amount             TEXT,
    is_paid            INTEGER NOT NULL DEFAULT 0,
    is_reviewed        INTEGER NOT NULL DEFAULT 0,
    raw_text           TEXT NOT NULL DEFAULT '',
    file_exists        INTEGER NOT NULL DEFAULT 0
);
";

const SELECT_COLUMNS: &str = "SELECT content_hash, original_file_name, external_id, invoice_date, \
     amount, is_paid, is_reviewed, raw_text, file_exists FROM invoices";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite invoice store. Statements run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteInvoiceStore {
    conn: Arc<Mutex<Connection>>,
}

/// A row as stored, before decoding text columns.
struct RawRow {
    content_hash: String,
    original_file_name: String,
    external_id: Option<String>,
    invoice_date: Option<String>,
    amount: Option<String>,
    is_paid: bool,
    is_reviewed: bool,
    raw_text: String,
    file_exists: bool,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            content_hash: row.get(0)?,
            original_file_name: row.get(1)?,
            external_id: row.get(2)?,
            invoice_date: row.get(3)?,
            amount: row.get(4)?,
            is_paid: row.get(5)?,
            is_reviewed: row.get(6)?,
            raw_text: row.get(7)?,
            file_exists: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<InvoiceRecord, DbError> {
        let content_hash =
            ContentHash::parse(&self.content_hash).ok_or_else(|| DbError::Corrupt {
                column: "content_hash",
                value: self.content_hash.clone(),
            })?;

        let invoice_date = self
            .invoice_date
            .map(|s| {
                NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|_| DbError::Corrupt {
                    column: "invoice_date",
                    value: s,
                })
            })
            .transpose()?;

        let amount = self
            .amount
            .map(|s| {
                Decimal::from_str(&s).map_err(|_| DbError::Corrupt {
                    column: "amount",
                    value: s,
                })
            })
            .transpose()?;

        Ok(InvoiceRecord {
            content_hash,
            original_file_name: self.original_file_name,
            external_id: self.external_id,
            invoice_date,
            amount,
            is_paid: self.is_paid,
            is_reviewed: self.is_reviewed,
            raw_text: self.raw_text,
            file_exists: self.file_exists,
        })
    }
}

/// Column assignments for the fields a patch carries.
fn patch_assignments(patch: &InvoicePatch) -> Vec<(&'static str, Value)> {
    fn text(value: Option<String>) -> Value {
        value.map(Value::Text).unwrap_or(Value::Null)
    }

    let mut columns = Vec::new();
    if let Some(id) = &patch.external_id {
        columns.push(("external_id", text(id.clone())));
    }
    if let Some(date) = &patch.invoice_date {
        columns.push((
            "invoice_date",
            text(date.map(|d| d.format(DATE_FORMAT).to_string())),
        ));
    }
    if let Some(amount) = &patch.amount {
        columns.push(("amount", text(amount.map(|a| a.to_string()))));
    }
    if let Some(paid) = patch.is_paid {
        columns.push(("is_paid", Value::Integer(paid.into())));
    }
    if let Some(reviewed) = patch.is_reviewed {
        columns.push(("is_reviewed", Value::Integer(reviewed.into())));
    }
    columns
}

impl SqliteInvoiceStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened invoice database at {}", path.display());
        Self::init(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on a blocking thread.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| DbError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }
}

#[async_trait]
impl InvoiceStore for SqliteInvoiceStore {
    async fn upsert(&self, record: &InvoiceRecord) -> Result<(), DbError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO invoices (content_hash, original_file_name, external_id, \
                 invoice_date, amount, is_paid, is_reviewed, raw_text, file_exists) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(content_hash) DO UPDATE SET \
                 original_file_name = excluded.original_file_name, \
                 external_id = excluded.external_id, \
                 invoice_date = excluded.invoice_date, \
                 amount = excluded.amount, \
                 is_paid = excluded.is_paid, \
                 is_reviewed = excluded.is_reviewed, \
                 raw_text = excluded.raw_text, \
                 file_exists = excluded.file_exists",
                params![
                    record.content_hash.as_str(),
                    record.original_file_name,
                    record.external_id,
                    record
                        .invoice_date
                        .map(|d| d.format(DATE_FORMAT).to_string()),
                    record.amount.map(|a| a.to_string()),
                    record.is_paid,
                    record.is_reviewed,
                    record.raw_text,
                    record.file_exists,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<InvoiceRecord>, DbError> {
        let hash = hash.as_str().to_string();
        self.with_conn(move |conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE content_hash = ?1");
            let row = conn
                .query_row(&sql, params![hash], RawRow::from_row)
                .optional()?;
            row.map(RawRow::into_record).transpose()
        })
        .await
    }

    async fn apply_patch(
        &self,
        hash: &ContentHash,
        patch: &InvoicePatch,
    ) -> Result<Option<InvoiceRecord>, DbError> {
        let hash = hash.as_str().to_string();
        let columns = patch_assignments(patch);
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if !columns.is_empty() {
                let assignments: Vec<String> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, (column, _))| format!("{} = ?{}", column, i + 2))
                    .collect();
                let sql = format!(
                    "UPDATE invoices SET {} WHERE content_hash = ?1",
                    assignments.join(", ")
                );
                let values = std::iter::once(Value::Text(hash.clone()))
                    .chain(columns.into_iter().map(|(_, value)| value));
                if tx.execute(&sql, params_from_iter(values))? == 0 {
                    return Ok(None);
                }
            }

            let sql = format!("{SELECT_COLUMNS} WHERE content_hash = ?1");
            let row = tx
                .query_row(&sql, params![hash], RawRow::from_row)
                .optional()?;
            tx.commit()?;
            row.map(RawRow::into_record).transpose()
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<InvoiceRecord>, DbError> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY original_file_name, content_hash");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], RawRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(RawRow::into_record).collect()
        })
        .await
    }

    async fn bulk_set_file_exists(
        &self,
        present: &HashSet<ContentHash>,
    ) -> Result<FileExistsCounts, DbError> {
        let hashes: Vec<&str> = present.iter().map(ContentHash::as_str).collect();
        let json = serde_json::to_string(&hashes).map_err(|e| DbError::Corrupt {
            column: "content_hash",
            value: e.to_string(),
        })?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE invoices SET file_exists = \
                 (content_hash IN (SELECT value FROM json_each(?1)))",
                params![json],
            )?;
            let (present, total): (i64, i64) = tx.query_row(
                "SELECT COALESCE(SUM(file_exists), 0), COUNT(*) FROM invoices",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            tx.commit()?;

            Ok(FileExistsCounts {
                present: present as usize,
                missing: (total - present) as usize,
            })
        })
        .await
    }
}
