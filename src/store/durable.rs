//! SQLite-backed store that survives restarts.
//!
//! The database is used as a plain key-value space: the `entries` table is
//! partitioned into named buckets, keys are 8-byte big-endian ids drawn from a
//! per-bucket sequence, and values are JSON-encoded records. Because SQLite
//! compares BLOBs bytewise, `ORDER BY key` yields ascending id order.
//!
//! Reads never touch the database. Every record is mirrored into a
//! [`PathIndex`] when the store is opened and after each committed insert.

use super::index::{read_index, write_index, PathIndex, StoredRecord};
use crate::error::{MappingError, StoreError};
use crate::mapping::{IncomingRequest, MappingId, RequestMapping, ResponseData};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::{debug, info};

const MAPPINGS_BUCKET: &str = "mappings";

/// How long a write waits for a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entries (
        bucket TEXT NOT NULL,
        key BLOB NOT NULL,
        value BLOB NOT NULL,
        PRIMARY KEY (bucket, key)
    );
    CREATE TABLE IF NOT EXISTS sequences (
        bucket TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
";

/// Persistent mapping store.
pub struct DurableStore {
    path: PathBuf,
    /// Also serializes `add` calls
    conn: Mutex<Connection>,
    index: RwLock<PathIndex>,
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("path", &self.path)
            .field("mappings", &self.len())
            .finish()
    }
}

/// File name of the store for a given version tag.
pub fn store_file_name(version: &str) -> String {
    format!("rest-mock-{version}.db")
}

impl DurableStore {
    /// Open (or create) the store at `path` and load every record into the
    /// index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .and_then(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        let mut index = PathIndex::new();
        for record in read_bucket(&conn, MAPPINGS_BUCKET)? {
            index.insert(record);
        }
        info!(path = %path.display(), mappings = index.len(), "Opened mapping store");

        Ok(Self {
            path,
            conn: Mutex::new(conn),
            index: RwLock::new(index),
        })
    }

    /// Open the store for `version` inside `data_dir`.
    pub fn open_versioned(data_dir: impl AsRef<Path>, version: &str) -> Result<Self, StoreError> {
        Self::open(data_dir.as_ref().join(store_file_name(version)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a mapping, then publish it to the index.
    ///
    /// Nothing is written when an equivalent mapping exists, and the index is
    /// left alone when the commit fails.
    pub fn add(
        &self,
        request: RequestMapping,
        response: ResponseData,
    ) -> Result<MappingId, MappingError> {
        let mut conn = self.lock_conn();

        if read_index(&self.index).find_duplicate(&request).is_some() {
            return Err(MappingError::Duplicate {
                method: request.method,
                path: request.path,
            });
        }

        let mut record = StoredRecord {
            id: 0,
            request,
            response,
        };
        let value = serde_json::to_vec(&record).map_err(StoreError::from)?;

        let tx = conn.transaction().map_err(StoreError::from)?;
        let id = next_sequence(&tx, MAPPINGS_BUCKET)?;
        tx.execute(
            "INSERT INTO entries (bucket, key, value) VALUES (?1, ?2, ?3)",
            params![MAPPINGS_BUCKET, id.to_be_bytes().to_vec(), value],
        )
        .map_err(StoreError::from)?;
        tx.commit().map_err(StoreError::from)?;
        debug!(id, "Stored mapping");

        record.id = id;
        write_index(&self.index).insert(record);
        Ok(id)
    }

    pub fn lookup(&self, request: &IncomingRequest) -> Result<ResponseData, MappingError> {
        read_index(&self.index)
            .lookup(request)
            .cloned()
            .ok_or_else(|| MappingError::NotFound {
                method: request.method().to_string(),
                path: request.path().to_string(),
            })
    }

    /// Every persisted record, read from the database in id order.
    pub fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        read_bucket(&self.lock_conn(), MAPPINGS_BUCKET)
    }

    pub fn len(&self) -> usize {
        read_index(&self.index).len()
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bump and return the sequence of `bucket`; the first value is 1.
fn next_sequence(conn: &Connection, bucket: &str) -> Result<MappingId, StoreError> {
    conn.execute(
        "INSERT INTO sequences (bucket, value) VALUES (?1, 1)
         ON CONFLICT(bucket) DO UPDATE SET value = value + 1",
        params![bucket],
    )?;
    let value: i64 = conn.query_row(
        "SELECT value FROM sequences WHERE bucket = ?1",
        params![bucket],
        |row| row.get(0),
    )?;
    Ok(value as MappingId)
}

fn read_bucket(conn: &Connection, bucket: &str) -> Result<Vec<StoredRecord>, StoreError> {
    let mut stmt = conn.prepare("SELECT key, value FROM entries WHERE bucket = ?1 ORDER BY key")?;
    let rows = stmt.query_map(params![bucket], |row| {
        Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (key, value) = row?;
        records.push(decode_record(&key, &value)?);
    }
    Ok(records)
}

fn decode_record(key: &[u8], value: &[u8]) -> Result<StoredRecord, StoreError> {
    let id = <[u8; 8]>::try_from(key)
        .map(MappingId::from_be_bytes)
        .map_err(|_| StoreError::CorruptKey(key.len()))?;
    let mut record: StoredRecord = serde_json::from_slice(value)?;
    record.id = id;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn secure_mapping() -> (RequestMapping, ResponseData) {
        (
            RequestMapping::new("GET", "/secure")
                .with_header("x-auth", "token1")
                .with_header("x-auth", "token2")
                .with_param("page", "1"),
            ResponseData::new(201)
                .with_header("Content-Type", "application/json")
                .with_header("Set-Cookie", "a=1")
                .with_header("Set-Cookie", "b=2")
                .with_body(vec![0u8, 1, 2, 255]),
        )
    }

    #[test]
    fn test_mappings_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        let (request, response) = secure_mapping();

        {
            let store = DurableStore::open(&path).unwrap();
            store.add(request.clone(), response.clone()).unwrap();
            store
                .add(
                    RequestMapping::new("GET", "/files"),
                    ResponseData::new(0).with_file(dir.path().join("body.json")),
                )
                .unwrap();
        }

        let store = DurableStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);

        let incoming = IncomingRequest::new("GET", "/secure")
            .with_header("X-Auth", "token2")
            .with_header("X-Auth", "token1");
        assert_eq!(store.lookup(&incoming).unwrap(), response);

        let records = store.load_all().unwrap();
        assert_eq!(records[0].request, request);
        assert_eq!(
            records[1].response.body,
            crate::mapping::ResponseBody::File {
                path: dir.path().join("body.json")
            }
        );
    }

    #[test]
    fn test_first_match_order_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = DurableStore::open(&path).unwrap();
            for i in 0..10 {
                store
                    .add(
                        RequestMapping::new("GET", format!("/filler/{i}")),
                        ResponseData::new(200),
                    )
                    .unwrap();
            }
            store
                .add(
                    RequestMapping::new("GET", "/items").with_header("x-b", "1"),
                    ResponseData::text(200, "B"),
                )
                .unwrap();
            store
                .add(
                    RequestMapping::new("GET", "/items").with_header("x-a", "1"),
                    ResponseData::text(200, "A"),
                )
                .unwrap();
        }

        let store = DurableStore::open(&path).unwrap();
        let both = IncomingRequest::new("GET", "/items")
            .with_header("X-A", "1")
            .with_header("X-B", "1");
        assert_eq!(store.lookup(&both).unwrap(), ResponseData::text(200, "B"));

        let only_a = IncomingRequest::new("GET", "/items").with_header("X-A", "1");
        assert_eq!(store.lookup(&only_a).unwrap(), ResponseData::text(200, "A"));
    }

    #[test]
    fn test_ids_continue_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        let first = DurableStore::open(&path)
            .unwrap()
            .add(RequestMapping::new("GET", "/a"), ResponseData::new(200))
            .unwrap();
        let second = DurableStore::open(&path)
            .unwrap()
            .add(RequestMapping::new("GET", "/b"), ResponseData::new(200))
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_load_all_follows_numeric_id_order() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path().join("store.db")).unwrap();

        // Enough records that a little-endian or textual key would sort wrong.
        for i in 0..300 {
            store
                .add(
                    RequestMapping::new("GET", format!("/item/{i}")),
                    ResponseData::new(200),
                )
                .unwrap();
        }

        let ids: Vec<_> = store.load_all().unwrap().iter().map(|r| r.id).collect();
        let expected: Vec<_> = (1..=300).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_duplicate_is_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        let store = DurableStore::open(&path).unwrap();
        let (request, response) = secure_mapping();

        store.add(request.clone(), response.clone()).unwrap();
        let mut equivalent = request.clone();
        equivalent.path = "/SECURE".to_string();
        let err = store.add(equivalent, response).unwrap_err();

        assert!(err.is_duplicate());
        assert_eq!(store.len(), 1);
        assert_eq!(store.load_all().unwrap().len(), 1);
        drop(store);
        assert_eq!(DurableStore::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_versioned_file_name() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open_versioned(dir.path(), "1.2.0").unwrap();
        assert_eq!(store.path(), dir.path().join("rest-mock-1.2.0.db"));
        assert!(store.path().exists());
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = DurableStore::open(dir.path().join("missing").join("store.db")).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn test_decode_rejects_short_key() {
        let err = decode_record(&[0, 1], b"{}").unwrap_err();
        assert!(matches!(err, StoreError::CorruptKey(2)));
    }
}
