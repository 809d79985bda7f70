//! Dispatcher between the HTTP layer and the mapping store.

use crate::config::GlobalSettings;
use crate::error::MappingError;
use crate::mapping::{IncomingRequest, MappingId, RequestMapping, ResponseData};
use crate::store::MappingStore;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

/// Registers mappings and resolves requests to their canned responses.
///
/// Shared across request tasks behind an `Arc`; `resolve` only takes read
/// locks, `add` calls are serialized inside the store.
#[derive(Debug)]
pub struct Mapper {
    store: MappingStore,
    log_matches: bool,
    log_unmatched: bool,
    /// Total requests resolved.
    requests_total: AtomicU64,
    /// Requests that found a mapping.
    requests_matched: AtomicU64,
    /// Requests that did not.
    requests_unmatched: AtomicU64,
}

impl Mapper {
    pub fn new(store: MappingStore, settings: &GlobalSettings) -> Self {
        info!(
            store = ?store.kind(),
            mappings = store.len(),
            "Mapper initialized"
        );

        Self {
            store,
            log_matches: settings.log_matches,
            log_unmatched: settings.log_unmatched,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Mapper over a fresh in-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::new(MappingStore::in_memory(), &GlobalSettings::default())
    }

    /// Register a mapping. Fails with [`MappingError::Duplicate`] when an
    /// equivalent mapping is already stored.
    pub fn add(
        &self,
        request: RequestMapping,
        response: ResponseData,
    ) -> Result<MappingId, MappingError> {
        let method = request.method.clone();
        let path = request.path.clone();
        let id = self.store.add(request, response)?;
        info!(id, method = %method, path = %path, "Added request mapping");
        Ok(id)
    }

    /// Register a batch of mappings, skipping duplicates.
    ///
    /// Returns how many were added. Store failures abort the batch.
    pub fn add_all<I>(&self, mappings: I) -> Result<usize, MappingError>
    where
        I: IntoIterator<Item = (RequestMapping, ResponseData)>,
    {
        let mut added = 0;
        for (request, response) in mappings {
            match self.add(request, response) {
                Ok(_) => added += 1,
                Err(MappingError::Duplicate { method, path }) => {
                    warn!(method = %method, path = %path, "Skipping duplicate mapping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// Find the response for an incoming request.
    pub fn resolve(&self, request: &IncomingRequest) -> Result<ResponseData, MappingError> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let result = self.store.lookup(request);
        match &result {
            Ok(response) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.log_matches {
                    info!(
                        method = %request.method(),
                        path = %request.path(),
                        status = response.status,
                        "Request matched mapping"
                    );
                }
            }
            Err(MappingError::Store(e)) => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                error!(
                    method = %request.method(),
                    path = %request.path(),
                    error = %e,
                    "Mapping store failed during lookup"
                );
            }
            Err(_) => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.log_unmatched {
                    warn!(
                        method = %request.method(),
                        path = %request.path(),
                        "No matching mapping found"
                    );
                }
            }
        }
        result
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Number of registered mappings.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }
}
