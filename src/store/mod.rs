//! Mapping persistence.
//!
//! [`MappingStore`] selects one of two backends at construction time:
//!
//! - [`InMemoryStore`]: a dictionary keyed by normalized path
//! - [`DurableStore`]: a SQLite key-value file mirrored into the same index
//!
//! Both reject duplicate declarations and resolve requests against their
//! in-memory [`PathIndex`], first match wins.

mod durable;
mod index;
mod memory;

pub use durable::{store_file_name, DurableStore};
pub use index::{PathIndex, StoredRecord};
pub use memory::InMemoryStore;

use crate::config::{StoreKind, StoreSettings};
use crate::error::{MappingError, StoreError};
use crate::mapping::{IncomingRequest, MappingId, RequestMapping, ResponseData};

/// Backend holding the declared mappings.
#[derive(Debug)]
pub enum MappingStore {
    InMemory(InMemoryStore),
    Durable(DurableStore),
}

impl MappingStore {
    pub fn in_memory() -> Self {
        MappingStore::InMemory(InMemoryStore::new())
    }

    /// Build the backend described by `settings`.
    pub fn open(settings: &StoreSettings) -> Result<Self, StoreError> {
        match settings.kind {
            StoreKind::Memory => Ok(Self::in_memory()),
            StoreKind::Durable => Ok(MappingStore::Durable(DurableStore::open_versioned(
                &settings.data_dir,
                &settings.version,
            )?)),
        }
    }

    /// Store a mapping unless an equivalent one exists.
    pub fn add(
        &self,
        request: RequestMapping,
        response: ResponseData,
    ) -> Result<MappingId, MappingError> {
        match self {
            MappingStore::InMemory(store) => store.add(request, response),
            MappingStore::Durable(store) => store.add(request, response),
        }
    }

    /// Response of the first stored mapping satisfied by `request`.
    pub fn lookup(&self, request: &IncomingRequest) -> Result<ResponseData, MappingError> {
        match self {
            MappingStore::InMemory(store) => store.lookup(request),
            MappingStore::Durable(store) => store.lookup(request),
        }
    }

    /// Every stored record in ascending id order.
    pub fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        match self {
            MappingStore::InMemory(store) => Ok(store.load_all()),
            MappingStore::Durable(store) => store.load_all(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MappingStore::InMemory(store) => store.len(),
            MappingStore::Durable(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            MappingStore::InMemory(_) => StoreKind::Memory,
            MappingStore::Durable(_) => StoreKind::Durable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_memory_store() {
        let store = MappingStore::open(&StoreSettings::default()).unwrap();
        assert_eq!(store.kind(), StoreKind::Memory);
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_durable_store() {
        let dir = TempDir::new().unwrap();
        let settings = StoreSettings {
            kind: StoreKind::Durable,
            data_dir: dir.path().to_path_buf(),
            version: "test".to_string(),
        };

        let store = MappingStore::open(&settings).unwrap();
        assert_eq!(store.kind(), StoreKind::Durable);
        store
            .add(RequestMapping::new("GET", "/"), ResponseData::text(201, "Success"))
            .unwrap();
        drop(store);

        let store = MappingStore::open(&settings).unwrap();
        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
        assert_eq!(
            store.lookup(&IncomingRequest::new("GET", "/")).unwrap(),
            ResponseData::text(201, "Success")
        );
    }
}
