//! Content-addressed response cache backed by a single SQLite file.
//!
//! Responses are keyed by a SHA-256 hash over the serialized
//! `(messages, model)` pair, so identical prompts hit identical rows and any
//! change to prompt text invalidates the entry automatically. A small
//! connection pool (bounded by a semaphore) keeps concurrent workers from
//! piling onto one connection; connections are recycled through an idle
//! stack and returned on every exit path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use crate::error::{LlmapError, Result};
use crate::types::Message;

/// Maximum simultaneously open SQLite connections.
const POOL_SIZE: usize = 10;

/// A stored LLM answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub answer: String,
    /// Row write time, as recorded by SQLite (`CURRENT_TIMESTAMP`).
    pub timestamp: String,
}

/// Compute the cache key for a request: hex SHA-256 of the serialized
/// `(messages, model)` pair. Serialization is deterministic, so identical
/// inputs always map to the same key.
pub fn cache_key(messages: &[Message], model: &str) -> Result<String> {
    let serialized = serde_json::to_vec(&(messages, model))?;
    let digest = Sha256::digest(&serialized);
    Ok(hex::encode(digest))
}

struct CacheInner {
    db_path: PathBuf,
    permits: Semaphore,
    idle: Mutex<Vec<Connection>>,
}

/// Pooled handle to the on-disk response cache. Cheap to clone.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

impl Cache {
    /// Open (creating if necessary) the cache in the per-user cache
    /// directory, e.g. `~/.cache/llmap/cache.db`.
    pub fn open_default() -> Result<Self> {
        let base = dirs::cache_dir().ok_or_else(|| {
            LlmapError::InvalidConfig("could not determine a user cache directory".into())
        })?;
        let dir = base.join("llmap");
        std::fs::create_dir_all(&dir)?;
        Self::open(&dir.join("cache.db"))
    }

    /// Open (creating if necessary) a cache at an explicit path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let cache = Self {
            inner: Arc::new(CacheInner {
                db_path: db_path.to_path_buf(),
                permits: Semaphore::new(POOL_SIZE),
                idle: Mutex::new(Vec::new()),
            }),
        };
        let conn = cache.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS responses (
                cache_key TEXT PRIMARY KEY,
                answer    TEXT NOT NULL,
                timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )?;
        cache.recycle(conn);
        Ok(cache)
    }

    /// Look up a stored answer. A miss is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT answer, timestamp FROM responses WHERE cache_key = ?1",
                [key],
                |row| {
                    Ok(CacheEntry {
                        answer: row.get(0)?,
                        timestamp: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Upsert an answer; the last writer wins and refreshes the timestamp.
    pub async fn set(&self, key: &str, answer: &str) -> Result<()> {
        let key = key.to_string();
        let answer = answer.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO responses (cache_key, answer, timestamp)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                [&key, &answer],
            )
            .map(|_| ())
        })
        .await
    }

    /// Remove an entry if present; removing an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| conn.execute("DELETE FROM responses WHERE cache_key = ?1", [&key]).map(|_| ()))
            .await
    }

    /// Run `f` on a pooled connection, returning the connection to the idle
    /// stack afterwards regardless of the outcome.
    async fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|e| LlmapError::Internal(format!("cache pool closed: {e}")))?;

        let conn = match self.checkout() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        let result = f(&conn);
        self.recycle(conn);
        Ok(result?)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.inner.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn checkout(&self) -> Option<Connection> {
        match self.inner.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(_) => None,
        }
    }

    fn recycle(&self, conn: Connection) {
        if let Ok(mut idle) = self.inner.idle.lock() {
            idle.push(conn);
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("db_path", &self.inner.db_path)
            .finish_non_exhaustive()
    }
}
