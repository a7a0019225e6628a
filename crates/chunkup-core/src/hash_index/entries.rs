//! Index reads and writes.

use serde::Serialize;
use sqlx::Row;

use super::db::{unix_timestamp, HashIndex};
use crate::error::UploadResult;
use crate::hash::ContentHash;

/// One index row, as listed by `index list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub hash: String,
    pub filename: String,
    pub recorded_at: i64,
}

impl HashIndex {
    /// Stored filename for `hash`, if any.
    ///
    /// Dedup is an optimization: a database error is logged and reported as absent.
    pub async fn lookup(&self, hash: &ContentHash) -> Option<String> {
        let row = sqlx::query("SELECT filename FROM hash_index WHERE hash = ?1")
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await;
        match row {
            Ok(row) => row.map(|r| r.get::<String, _>("filename")),
            Err(e) => {
                tracing::warn!(%hash, error = %e, "hash index lookup failed; treating as absent");
                None
            }
        }
    }

    /// Upsert `hash → filename`; the last write for a hash wins.
    pub async fn record(&self, hash: &ContentHash, filename: &str) -> UploadResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO hash_index (hash, filename, recorded_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(hash) DO UPDATE SET
                filename = excluded.filename,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(hash.as_str())
        .bind(filename)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        tracing::debug!(%hash, filename, "hash index updated");
        Ok(())
    }

    /// Drop the entry for `hash`. Returns whether one existed.
    pub async fn remove(&self, hash: &ContentHash) -> UploadResult<bool> {
        let _guard = self.write_lock.lock().await;
        let done = sqlx::query("DELETE FROM hash_index WHERE hash = ?1")
            .bind(hash.as_str())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// All entries, newest first.
    pub async fn list(&self) -> UploadResult<Vec<IndexEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT hash, filename, recorded_at
            FROM hash_index
            ORDER BY recorded_at DESC, hash ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| IndexEntry {
                hash: row.get("hash"),
                filename: row.get("filename"),
                recorded_at: row.get("recorded_at"),
            })
            .collect())
    }
}
