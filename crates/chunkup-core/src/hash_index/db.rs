//! Connection, migrations and timestamp helpers. Entry CRUD lives in `entries`.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::error::{IoContext, UploadResult};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the hash index. Cheap to clone; clones share the pool and the
/// write lock.
#[derive(Clone)]
pub struct HashIndex {
    pub(crate) pool: Pool<Sqlite>,
    /// Serializes every mutation so concurrent completions can't interleave.
    pub(crate) write_lock: Arc<Mutex<()>>,
}

impl HashIndex {
    /// Open (or create) the index at `path`. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .storage_context(|| format!("create dir {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let index = HashIndex {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        index.migrate().await?;
        tracing::debug!(path = %path.display(), "hash index opened");
        Ok(index)
    }

    /// In-memory index with no disk I/O. One connection that is never
    /// recycled, since the database lives and dies with it.
    pub async fn open_memory() -> UploadResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let index = HashIndex {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> UploadResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hash_index (
                hash TEXT PRIMARY KEY NOT NULL,
                filename TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close the pool, flushing WAL state.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Current time as Unix seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
