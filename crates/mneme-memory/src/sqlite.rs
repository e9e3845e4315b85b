//! SQLite-backed implementation of every memory store.

use crate::error::MemoryError;
use crate::model::{
    Emphasis, LongTermRecord, MAX_IMPORTANCE, MIN_IMPORTANCE, MemoryCategory, NewRecord,
    RetrievalResult, Role, SessionSummary, Turn,
};
use crate::store::{ConversationStore, ShortTermLog, SummaryStore, VectorStore};
use crate::vector::{bytes_to_embedding, cosine_similarity, embedding_to_bytes};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::cmp::Ordering;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS memories (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    category TEXT NOT NULL,
    importance INTEGER NOT NULL CHECK (importance BETWEEN 1 AND 10),
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_memories_owner ON memories(owner_id);
CREATE TABLE IF NOT EXISTS turns (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, seq);
CREATE TABLE IF NOT EXISTS summaries (
    session_id TEXT PRIMARY KEY,
    summary_text TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

const DIMENSION_KEY: &str = "embedding_dim";
const RECORD_COLUMNS: &str = "id, owner_id, content, category, importance, embedding, created_at, last_accessed, access_count";
const TURN_COLUMNS: &str = "id, session_id, role, content, created_at";
/// Connections kept for a file-backed database.
const FILE_POOL_SIZE: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable store for long-term records, turns, and summaries.
///
/// Each call checks a connection out of an r2d2 pool on a blocking worker.
/// File databases run in WAL mode, so readers proceed while another
/// session's write waits on a lock.
pub struct SqliteMemoryStore {
    pool: Pool<SqliteConnectionManager>,
    dimension: usize,
}

impl std::fmt::Debug for SqliteMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMemoryStore")
            .field("dimension", &self.dimension)
            .field("connections", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

impl SqliteMemoryStore {
    /// Open (or create) a database file with the given embedding dimension.
    ///
    /// Reopening a database created with a different dimension fails with
    /// `DimensionMismatch`.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        });
        let pool = Pool::builder().max_size(FILE_POOL_SIZE).build(manager)?;
        let store = Self::initialize(pool, dimension)?;
        info!(
            "opened sqlite memory store (path={}, dimension={}, connections={})",
            path.display(),
            dimension,
            FILE_POOL_SIZE
        );
        Ok(store)
    }

    /// Open a private in-memory database.
    ///
    /// The database lives inside its single connection, so the pool holds
    /// exactly one and never recycles it.
    pub fn open_in_memory(dimension: usize) -> Result<Self, MemoryError> {
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())?;
        let store = Self::initialize(pool, dimension)?;
        debug!("opened in-memory sqlite store (dimension={})", dimension);
        Ok(store)
    }

    fn initialize(
        pool: Pool<SqliteConnectionManager>,
        dimension: usize,
    ) -> Result<Self, MemoryError> {
        if dimension == 0 {
            return Err(MemoryError::InvalidParameter(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![DIMENSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(value) => {
                let expected = value.parse::<usize>().map_err(|_| {
                    MemoryError::InvalidRecord(format!("stored embedding dimension {value:?}"))
                })?;
                if expected != dimension {
                    return Err(MemoryError::DimensionMismatch {
                        expected,
                        actual: dimension,
                    });
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                    params![DIMENSION_KEY, dimension.to_string()],
                )?;
            }
        }
        drop(conn);
        Ok(Self { pool, dimension })
    }

    /// Run `op` on a pooled connection from the blocking worker pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, MemoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, MemoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            op(&mut *conn)
        })
        .await?
    }

    fn validate_new_record(&self, record: &NewRecord) -> Result<(), MemoryError> {
        if record.embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: record.embedding.len(),
            });
        }
        if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&record.importance) {
            return Err(MemoryError::InvalidRecord(format!(
                "importance {} outside [{MIN_IMPORTANCE}, {MAX_IMPORTANCE}]",
                record.importance
            )));
        }
        if record.content.trim().is_empty() {
            return Err(MemoryError::InvalidRecord("empty content".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteMemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, owner_id: &str, record: NewRecord) -> Result<Uuid, MemoryError> {
        self.validate_new_record(&record)?;
        let id = Uuid::new_v4();
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO memories (id, owner_id, content, category, importance, embedding, created_at, last_accessed, access_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0)",
                params![
                    id.to_string(),
                    owner_id,
                    record.content,
                    record.category.as_str(),
                    i64::from(record.importance),
                    embedding_to_bytes(&record.embedding),
                    now,
                ],
            )?;
            debug!(
                "inserted long-term record (owner_id={}, id={}, category={}, importance={})",
                owner_id, id, record.category, record.importance
            );
            Ok(id)
        })
        .await
    }

    async fn search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievalResult>, MemoryError> {
        if query_embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let owner_id = owner_id.to_string();
        let query = query_embedding.to_vec();
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT {RECORD_COLUMNS} FROM memories WHERE owner_id = ?1 ORDER BY seq");
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params![owner_id], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            let scanned = records.len();

            let mut results: Vec<RetrievalResult> = records
                .into_iter()
                .filter_map(|record| {
                    let similarity = cosine_similarity(&query, &record.embedding);
                    (similarity >= min_similarity).then_some(RetrievalResult {
                        record,
                        similarity,
                        relevance: similarity,
                        emphasis: Emphasis::Low,
                    })
                })
                .collect();
            results.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(Ordering::Equal)
            });
            results.truncate(k);
            debug!(
                "vector search (owner_id={}, scanned={}, returned={})",
                owner_id,
                scanned,
                results.len()
            );
            Ok(results)
        })
        .await
    }

    async fn touch_many(&self, ids: &[Uuid]) -> Result<usize, MemoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let mut touched = 0;
            {
                let mut stmt = tx.prepare(
                    "UPDATE memories SET access_count = access_count + 1, last_accessed = ?2 WHERE id = ?1",
                )?;
                for id in &ids {
                    touched += stmt.execute(params![id.to_string(), now])?;
                }
            }
            tx.commit()?;
            Ok(touched)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<LongTermRecord>, MemoryError> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id = ?1");
            let record = conn
                .query_row(&sql, params![id.to_string()], record_from_row)
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn list_all(&self, owner_id: &str) -> Result<Vec<LongTermRecord>, MemoryError> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM memories WHERE owner_id = ?1 ORDER BY created_at DESC, seq DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![owner_id], record_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError> {
        self.with_conn(move |conn| {
            let removed =
                conn.execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()])?;
            debug!("deleted long-term record (id={}, removed={})", id, removed);
            Ok(removed > 0)
        })
        .await
    }

    async fn purge_owner(&self, owner_id: &str) -> Result<usize, MemoryError> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let removed =
                tx.execute("DELETE FROM memories WHERE owner_id = ?1", params![owner_id])?;
            tx.commit()?;
            info!(
                "purged long-term records (owner_id={}, removed={})",
                owner_id, removed
            );
            Ok(removed)
        })
        .await
    }

    async fn count(&self, owner_id: &str) -> Result<usize, MemoryError> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            count_rows(
                conn,
                "SELECT COUNT(*) FROM memories WHERE owner_id = ?1",
                &owner_id,
            )
        })
        .await
    }
}

#[async_trait]
impl ShortTermLog for SqliteMemoryStore {
    async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Turn, MemoryError> {
        let turn = Turn {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO turns (id, session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    turn.id.to_string(),
                    turn.session_id,
                    turn.role.as_str(),
                    turn.content,
                    turn.created_at,
                ],
            )?;
            debug!(
                "appended turn (session_id={}, role={}, content_len={})",
                turn.session_id,
                turn.role,
                turn.content.len()
            );
            Ok(turn)
        })
        .await
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {TURN_COLUMNS} FROM (
                     SELECT seq, {TURN_COLUMNS} FROM turns WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2
                 ) ORDER BY seq ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![session_id, sql_limit(limit)], turn_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn oldest(&self, session_id: &str, n: usize) -> Result<Vec<Turn>, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {TURN_COLUMNS} FROM turns WHERE session_id = ?1 ORDER BY seq ASC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![session_id, sql_limit(n)], turn_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<usize, MemoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let removed = delete_turns(&tx, &ids)?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn all(&self, session_id: &str) -> Result<Vec<Turn>, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let sql =
                format!("SELECT {TURN_COLUMNS} FROM turns WHERE session_id = ?1 ORDER BY seq ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![session_id], turn_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn count(&self, session_id: &str) -> Result<usize, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            count_rows(
                conn,
                "SELECT COUNT(*) FROM turns WHERE session_id = ?1",
                &session_id,
            )
        })
        .await
    }

    async fn clear(&self, session_id: &str) -> Result<usize, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let removed =
                conn.execute("DELETE FROM turns WHERE session_id = ?1", params![session_id])?;
            info!(
                "cleared short-term log (session_id={}, removed={})",
                session_id, removed
            );
            Ok(removed)
        })
        .await
    }
}

#[async_trait]
impl SummaryStore for SqliteMemoryStore {
    async fn get_summary(&self, session_id: &str) -> Result<Option<SessionSummary>, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let summary = conn
                .query_row(
                    "SELECT session_id, summary_text, updated_at FROM summaries WHERE session_id = ?1",
                    params![session_id],
                    |row| {
                        Ok(SessionSummary {
                            session_id: row.get(0)?,
                            summary_text: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(summary)
        })
        .await
    }

    async fn upsert_summary(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<SessionSummary, MemoryError> {
        let session_id = session_id.to_string();
        let text = text.to_string();
        self.with_conn(move |conn| upsert_summary_row(conn, &session_id, &text))
            .await
    }

    async fn delete_summary(&self, session_id: &str) -> Result<bool, MemoryError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM summaries WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl ConversationStore for SqliteMemoryStore {
    async fn commit_compaction(
        &self,
        session_id: &str,
        summary: &str,
        chunk_ids: &[Uuid],
    ) -> Result<usize, MemoryError> {
        let session_id = session_id.to_string();
        let summary = summary.to_string();
        let chunk_ids = chunk_ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            upsert_summary_row(&tx, &session_id, &summary)?;
            let removed = delete_turns(&tx, &chunk_ids)?;
            tx.commit()?;
            info!(
                "committed compaction (session_id={}, removed={}, summary_len={})",
                session_id,
                removed,
                summary.len()
            );
            Ok(removed)
        })
        .await
    }
}

fn count_rows(conn: &Connection, sql: &str, key: &str) -> Result<usize, MemoryError> {
    let count: i64 = conn.query_row(sql, params![key], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

fn upsert_summary_row(
    conn: &Connection,
    session_id: &str,
    text: &str,
) -> Result<SessionSummary, MemoryError> {
    let summary = SessionSummary {
        session_id: session_id.to_string(),
        summary_text: text.to_string(),
        updated_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO summaries (session_id, summary_text, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(session_id) DO UPDATE SET summary_text = excluded.summary_text, updated_at = excluded.updated_at",
        params![summary.session_id, summary.summary_text, summary.updated_at],
    )?;
    Ok(summary)
}

fn delete_turns(tx: &Transaction<'_>, ids: &[Uuid]) -> Result<usize, MemoryError> {
    let mut stmt = tx.prepare("DELETE FROM turns WHERE id = ?1")?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute(params![id.to_string()])?;
    }
    Ok(removed)
}

/// SQLite LIMIT takes a signed integer.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn conversion_error(
    column: usize,
    kind: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, err.into())
}

fn parse_uuid(row: &Row<'_>, column: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_error(column, Type::Text, err))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<LongTermRecord> {
    let category: String = row.get(3)?;
    let importance: i64 = row.get(4)?;
    let blob: Vec<u8> = row.get(5)?;
    let embedding = bytes_to_embedding(&blob).ok_or_else(|| {
        conversion_error(5, Type::Blob, format!("embedding blob of {} bytes", blob.len()))
    })?;
    let access_count: i64 = row.get(8)?;
    let created_at: DateTime<Utc> = row.get(6)?;
    let last_accessed: DateTime<Utc> = row.get(7)?;
    Ok(LongTermRecord {
        id: parse_uuid(row, 0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        category: MemoryCategory::from_tag(&category),
        importance: u8::try_from(importance)
            .map_err(|err| conversion_error(4, Type::Integer, err))?,
        embedding,
        created_at,
        last_accessed,
        access_count: u64::try_from(access_count).unwrap_or_default(),
    })
}

fn turn_from_row(row: &Row<'_>) -> rusqlite::Result<Turn> {
    let role: String = row.get(2)?;
    Ok(Turn {
        id: parse_uuid(row, 0)?,
        session_id: row.get(1)?,
        role: role
            .parse::<Role>()
            .map_err(|err| conversion_error(2, Type::Text, err))?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}


#[cfg(test)]
mod tests {
    use super::SqliteMemoryStore;
    use crate::error::MemoryError;
    use crate::model::{MemoryCategory, NewRecord, Role};
    use crate::store::{ConversationStore, ShortTermLog, SummaryStore, VectorStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn record(content: &str, importance: u8, embedding: Vec<f32>) -> NewRecord {
        NewRecord {
            content: content.to_string(),
            category: MemoryCategory::Fact,
            importance,
            embedding,
        }
    }

    async fn contents(store: &SqliteMemoryStore, session_id: &str) -> Vec<String> {
        store
            .all(session_id)
            .await
            .expect("all")
            .into_iter()
            .map(|turn| turn.content)
            .collect()
    }

    #[tokio::test]
    async fn search_filters_by_floor_and_owner() {
        let store = SqliteMemoryStore::open_in_memory(2).expect("store");
        store.insert("alice", record("close", 5, vec![1.0, 0.1])).await.expect("insert");
        store.insert("alice", record("far", 5, vec![0.0, 1.0])).await.expect("insert");
        store.insert("bob", record("other owner", 5, vec![1.0, 0.0])).await.expect("insert");

        let results = store.search("alice", &[1.0, 0.0], 5, 0.7).await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.content, "close");
        assert_eq!(results[0].relevance, results[0].similarity);
        assert!(results[0].similarity >= 0.7);
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_truncates() {
        let store = SqliteMemoryStore::open_in_memory(2).expect("store");
        store.insert("alice", record("b", 5, vec![1.0, 0.5])).await.expect("insert");
        store.insert("alice", record("a", 5, vec![1.0, 0.0])).await.expect("insert");
        store.insert("alice", record("c", 5, vec![1.0, 0.9])).await.expect("insert");

        let results = store.search("alice", &[1.0, 0.0], 2, 0.0).await.expect("search");
        let order: Vec<_> = results.iter().map(|r| r.record.content.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert!(
            store
                .search("alice", &[1.0, 0.0], 0, 0.0)
                .await
                .expect("search")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension_and_importance() {
        let store = SqliteMemoryStore::open_in_memory(3).expect("store");
        let err = store.insert("alice", record("x", 5, vec![1.0])).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
        let err = store
            .insert("alice", record("x", 11, vec![1.0, 0.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidRecord(_)));
        assert_eq!(VectorStore::count(&store, "alice").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn touch_updates_access_metadata() {
        let store = SqliteMemoryStore::open_in_memory(1).expect("store");
        let id = store.insert("alice", record("x", 5, vec![1.0])).await.expect("insert");
        let before = store.get(id).await.expect("get").expect("record");
        store.touch(id).await.expect("touch");
        store.touch(id).await.expect("touch");
        let after = store.get(id).await.expect("get").expect("record");
        assert_eq!(after.access_count, 2);
        assert!(after.last_accessed >= before.last_accessed);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn touch_many_updates_every_listed_record_once() {
        let store = SqliteMemoryStore::open_in_memory(1).expect("store");
        let first = store.insert("alice", record("first", 5, vec![1.0])).await.expect("insert");
        let second = store.insert("alice", record("second", 5, vec![1.0])).await.expect("insert");
        let untouched = store.insert("alice", record("third", 5, vec![1.0])).await.expect("insert");

        let touched = store
            .touch_many(&[first, second, uuid::Uuid::new_v4()])
            .await
            .expect("touch_many");
        assert_eq!(touched, 2);
        assert_eq!(store.touch_many(&[]).await.expect("empty"), 0);

        let mut counts = Vec::new();
        for id in [first, second, untouched] {
            counts.push(store.get(id).await.expect("get").expect("record").access_count);
        }
        assert_eq!(counts, vec![1, 1, 0]);
    }

    #[tokio::test]
    async fn list_delete_and_purge() {
        let store = SqliteMemoryStore::open_in_memory(1).expect("store");
        let first = store.insert("alice", record("first", 5, vec![1.0])).await.expect("insert");
        store.insert("alice", record("second", 5, vec![1.0])).await.expect("insert");
        store.insert("bob", record("bob's", 5, vec![1.0])).await.expect("insert");

        let listed: Vec<_> = store
            .list_all("alice")
            .await
            .expect("list")
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(listed, vec!["second".to_string(), "first".to_string()]);

        assert!(store.delete(first).await.expect("delete"));
        assert!(!store.delete(first).await.expect("delete again"));
        assert_eq!(store.purge_owner("alice").await.expect("purge"), 1);
        assert!(store.list_all("alice").await.expect("list").is_empty());
        assert_eq!(VectorStore::count(&store, "bob").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn recent_and_oldest_are_chronological() {
        let store = SqliteMemoryStore::open_in_memory(1).expect("store");
        for idx in 1..=5 {
            store
                .append("s1", Role::User, &format!("turn {idx}"))
                .await
                .expect("append");
        }
        store.append("s2", Role::User, "elsewhere").await.expect("append");

        let recent: Vec<_> = store
            .recent("s1", 2)
            .await
            .expect("recent")
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(recent, vec!["turn 4".to_string(), "turn 5".to_string()]);
        let oldest: Vec<_> = store
            .oldest("s1", 2)
            .await
            .expect("oldest")
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(oldest, vec!["turn 1".to_string(), "turn 2".to_string()]);
        assert_eq!(ShortTermLog::count(&store, "s1").await.expect("count"), 5);
        assert_eq!(store.clear("s1").await.expect("clear"), 5);
        assert_eq!(contents(&store, "s2").await, vec!["elsewhere".to_string()]);
    }

    #[tokio::test]
    async fn summary_is_replaced_not_appended() {
        let store = SqliteMemoryStore::open_in_memory(1).expect("store");
        assert!(store.get_summary("s1").await.expect("get").is_none());
        store.upsert_summary("s1", "first").await.expect("upsert");
        store.upsert_summary("s1", "second").await.expect("upsert");
        let summary = store.get_summary("s1").await.expect("get").expect("summary");
        assert_eq!(summary.summary_text, "second");
        assert!(store.delete_summary("s1").await.expect("delete"));
        assert!(store.get_summary("s1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn compaction_commits_summary_and_deletes_chunk() {
        let store = SqliteMemoryStore::open_in_memory(1).expect("store");
        for idx in 1..=4 {
            store
                .append("s1", Role::Assistant, &format!("turn {idx}"))
                .await
                .expect("append");
        }
        let chunk: Vec<_> = store
            .oldest("s1", 3)
            .await
            .expect("oldest")
            .into_iter()
            .map(|t| t.id)
            .collect();
        let removed = store
            .commit_compaction("s1", "folded", &chunk)
            .await
            .expect("compact");
        assert_eq!(removed, 3);
        assert_eq!(contents(&store, "s1").await, vec!["turn 4".to_string()]);
        assert_eq!(
            store
                .get_summary("s1")
                .await
                .expect("get")
                .expect("summary")
                .summary_text,
            "folded"
        );
    }

    #[tokio::test]
    async fn reopen_checks_persisted_dimension() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("memory.db");
        {
            let store = SqliteMemoryStore::open(&path, 4).expect("open");
            store
                .insert("alice", record("persisted", 7, vec![0.1, 0.2, 0.3, 0.4]))
                .await
                .expect("insert");
        }
        let reopened = SqliteMemoryStore::open(&path, 4).expect("reopen");
        let records = reopened.list_all("alice").await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].embedding, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(records[0].importance, 7);

        let err = SqliteMemoryStore::open(&path, 8).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 4,
                actual: 8
            }
        ));
    }

    #[tokio::test]
    async fn corrupt_rows_surface_as_sqlite_errors() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("memory.db");
        let store = SqliteMemoryStore::open(&path, 2).expect("open");
        store
            .insert("alice", record("fine", 5, vec![1.0, 0.0]))
            .await
            .expect("insert");

        let raw = rusqlite::Connection::open(&path).expect("raw");
        raw.execute("UPDATE memories SET embedding = x'010203'", [])
            .expect("corrupt");

        let err = store.list_all("alice").await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Sqlite(rusqlite::Error::FromSqlConversionFailure(5, _, _))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_inserts_survive_purge_of_other_owner() {
        let store = Arc::new(SqliteMemoryStore::open_in_memory(1).expect("store"));
        for idx in 0..10 {
            store
                .insert("doomed", record(&format!("d{idx}"), 5, vec![1.0]))
                .await
                .expect("insert");
        }
        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for idx in 0..20 {
                    store
                        .insert("keeper", record(&format!("k{idx}"), 5, vec![1.0]))
                        .await
                        .expect("insert");
                }
            })
        };
        let purged = store.purge_owner("doomed").await.expect("purge");
        writer.await.expect("join");
        assert_eq!(purged, 10);
        assert_eq!(VectorStore::count(store.as_ref(), "doomed").await.expect("count"), 0);
        assert_eq!(VectorStore::count(store.as_ref(), "keeper").await.expect("count"), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_writer_does_not_block_other_sessions() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("memory.db");
        let store = Arc::new(SqliteMemoryStore::open(&path, 1).expect("open"));
        store.append("b", Role::User, "hello").await.expect("seed");

        // Another process holds the write lock.
        let blocker = rusqlite::Connection::open(&path).expect("blocker");
        blocker.execute_batch("BEGIN IMMEDIATE").expect("lock");

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append("a", Role::User, "queued").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let count = tokio::time::timeout(
            Duration::from_millis(500),
            ShortTermLog::count(store.as_ref(), "b"),
        )
        .await
        .expect("read on another session waited for the writer")
        .expect("count");
        assert_eq!(count, 1);
        assert!(!writer.is_finished());

        blocker.execute_batch("COMMIT").expect("unlock");
        writer.await.expect("join").expect("append");
        assert_eq!(ShortTermLog::count(store.as_ref(), "a").await.expect("count"), 1);
    }
}
