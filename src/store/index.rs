//! Path-keyed lookup table shared by both store backends.

use crate::mapping::{IncomingRequest, MappingId, RequestMapping, ResponseData};
use crate::normalize::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A mapping as held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Assigned by the store; carried by the key, not the encoded value
    #[serde(skip)]
    pub id: MappingId,
    pub request: RequestMapping,
    pub response: ResponseData,
}

/// Records grouped by normalized path, each bucket in insertion order.
#[derive(Debug, Default)]
pub struct PathIndex {
    buckets: HashMap<String, Vec<StoredRecord>>,
    len: usize,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// First stored mapping that declares the same endpoint as `mapping`.
    pub fn find_duplicate(&self, mapping: &RequestMapping) -> Option<&StoredRecord> {
        self.buckets
            .get(&normalize_path(&mapping.path))?
            .iter()
            .find(|record| record.request.matches_mapping(mapping))
    }

    /// Append a record to the end of its path bucket.
    pub fn insert(&mut self, record: StoredRecord) {
        self.buckets
            .entry(normalize_path(&record.request.path))
            .or_default()
            .push(record);
        self.len += 1;
    }

    /// Response of the earliest inserted mapping satisfied by `request`.
    pub fn lookup(&self, request: &IncomingRequest) -> Option<&ResponseData> {
        self.buckets
            .get(&normalize_path(request.path()))?
            .iter()
            .find(|record| record.request.matches_request(request))
            .map(|record| &record.response)
    }

    /// All records ordered by id.
    pub fn records(&self) -> Vec<StoredRecord> {
        let mut records: Vec<_> = self.buckets.values().flatten().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// Index mutations are single pushes, so a panicked writer cannot leave a
// bucket half-updated; the poisoned guard is still usable.
pub(crate) fn read_index(index: &RwLock<PathIndex>) -> RwLockReadGuard<'_, PathIndex> {
    index.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_index(index: &RwLock<PathIndex>) -> RwLockWriteGuard<'_, PathIndex> {
    index.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
