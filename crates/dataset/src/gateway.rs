//! Opening datasets read-only and decoding result rows.

use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row, TypeInfo, ValueRef};

use quarry_core::{Scraper, StorageLayout};

use crate::error::QueryError;
use crate::value::{QueryRow, SqlValue};

/// Read-only query interface over scraper datasets.
///
/// Never opens a store writable, and never blocks a concurrently running
/// orchestration from writing: results observed during an in-flight run
/// are best-effort, with last-writer-visible-on-reopen consistency.
pub struct QueryGateway {
    layout: StorageLayout,
}

impl QueryGateway {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Execute `sql` against the scraper's dataset, decoding each column by
    /// its SQLite storage class.
    pub async fn query(
        &self,
        scraper: &Scraper,
        sql: &str,
    ) -> Result<Vec<QueryRow>, QueryError> {
        let path = self.layout.dataset_path(scraper.slug());

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(QueryError::StoreAbsent {
                    path: path.display().to_string(),
                })
            }
            Err(e) => return Err(QueryError::Other(sqlx::Error::Io(e))),
        }

        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(classify_sqlite_failure)?;

        let result = sqlx::query(sql)
            .fetch_all(&mut conn)
            .await
            .map_err(classify_sqlite_failure);
        conn.close().await.ok();

        result?.iter().map(decode_row).collect()
    }

    /// Like [`query`](Self::query), but the expected failure categories
    /// (store absent, store corrupt, malformed SQL) degrade to an empty
    /// result. Anything else still propagates.
    ///
    /// By design a failed query through this path is indistinguishable from
    /// "no data yet".
    pub async fn query_safe(
        &self,
        scraper: &Scraper,
        sql: &str,
    ) -> Result<Vec<QueryRow>, QueryError> {
        match self.query(scraper, sql).await {
            Ok(rows) => Ok(rows),
            Err(
                e @ (QueryError::StoreAbsent { .. }
                | QueryError::StoreCorrupt { .. }
                | QueryError::MalformedQuery { .. }),
            ) => {
                tracing::debug!(scraper = %scraper.slug(), error = %e, "query_safe degraded to empty result");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode one row, preserving column order.
fn decode_row(row: &SqliteRow) -> Result<QueryRow, QueryError> {
    let mut columns = Vec::with_capacity(row.columns().len());
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            // SQLite reports the storage class of the stored value itself,
            // so dynamic typing per-cell decodes correctly.
            match raw.type_info().name() {
                "INTEGER" => SqlValue::Integer(row.try_get(idx)?),
                "REAL" => SqlValue::Real(row.try_get(idx)?),
                "BLOB" => SqlValue::Blob(row.try_get(idx)?),
                _ => SqlValue::Text(row.try_get(idx)?),
            }
        };
        columns.push((column.name().to_string(), value));
    }
    Ok(QueryRow { columns })
}

/// Map a sqlx failure to the query error taxonomy.
///
/// SQLite reports a truncated or overwritten store as "file is not a
/// database". Every other database-level error from ad-hoc user SQL
/// (syntax errors, unknown tables or columns, writes against a read-only
/// handle) counts as a malformed query; driver and I/O failures propagate
/// as-is.
fn classify_sqlite_failure(e: sqlx::Error) -> QueryError {
    if let sqlx::Error::Database(db) = &e {
        let message = db.message().to_lowercase();
        if message.contains("not a database") {
            return QueryError::StoreCorrupt {
                detail: db.message().to_string(),
            };
        }
        return QueryError::MalformedQuery {
            message: db.message().to_string(),
        };
    }
    QueryError::Other(e)
}
