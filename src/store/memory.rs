//! Dictionary-backed store; contents live only as long as the process.

use super::index::{read_index, write_index, PathIndex, StoredRecord};
use crate::error::MappingError;
use crate::mapping::{IncomingRequest, MappingId, RequestMapping, ResponseData};
use std::sync::RwLock;

/// In-memory mapping store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    index: RwLock<PathIndex>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping. The duplicate check and the insert happen under
    /// one write lock.
    pub fn add(
        &self,
        request: RequestMapping,
        response: ResponseData,
    ) -> Result<MappingId, MappingError> {
        let mut index = write_index(&self.index);

        if index.find_duplicate(&request).is_some() {
            return Err(MappingError::Duplicate {
                method: request.method,
                path: request.path,
            });
        }

        let id = index.len() as MappingId + 1;
        index.insert(StoredRecord {
            id,
            request,
            response,
        });
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

    pub fn load_all(&self) -> Vec<StoredRecord> {
        read_index(&self.index).records()
    }

    pub fn len(&self) -> usize {
        read_index(&self.index).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let store = InMemoryStore::new();
        let a = store
            .add(RequestMapping::new("GET", "/a"), ResponseData::new(200))
            .unwrap();
        let b = store
            .add(RequestMapping::new("GET", "/b"), ResponseData::new(200))
            .unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn test_duplicate_leaves_store_unchanged() {
        let store = InMemoryStore::new();
        store
            .add(RequestMapping::new("GET", "/a"), ResponseData::text(200, "one"))
            .unwrap();

        let err = store
            .add(RequestMapping::new("GET", "/A"), ResponseData::text(200, "two"))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.len(), 1);

        let response = store.lookup(&IncomingRequest::new("GET", "/a")).unwrap();
        assert_eq!(response, ResponseData::text(200, "one"));
    }

    #[test]
    fn test_lookup_not_found() {
        let store = InMemoryStore::new();
        let err = store.lookup(&IncomingRequest::new("GET", "/none")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_all_in_id_order() {
        let store = InMemoryStore::new();
        for path in ["/c", "/a", "/b"] {
            store
                .add(RequestMapping::new("GET", path), ResponseData::new(204))
                .unwrap();
        }
        let paths: Vec<_> = store
            .load_all()
            .into_iter()
            .map(|r| r.request.path)
            .collect();
        assert_eq!(paths, vec!["/c", "/a", "/b"]);
    }
}
