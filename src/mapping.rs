//! Request mappings, canned responses, and the matching predicates.
//!
//! A [`RequestMapping`] declares what a request must look like; the paired
//! [`ResponseData`] is what gets sent back when it does.

use crate::normalize::{
    contains_all, is_header_subset, lowercase_keys, lowercase_map, paths_equal, HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier assigned to a mapping by the store that holds it.
pub type MappingId = u64;

/// Match criteria for one declared endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMapping {
    /// HTTP method, compared exactly
    pub method: String,
    /// URL path, compared ignoring case
    pub path: String,
    /// Required headers; every listed value must be present on the request
    #[serde(default)]
    pub headers: HeaderMap,
    /// Query parameters (stored, not evaluated during matching)
    #[serde(default)]
    pub params: HeaderMap,
}

impl RequestMapping {
    /// Create a mapping with no header or parameter constraints.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HeaderMap::new(),
            params: HeaderMap::new(),
        }
    }

    /// Require a header value. Repeated calls for the same name accumulate.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Record a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Check whether an incoming request satisfies this mapping.
    ///
    /// Method must be equal, path equal ignoring case, and each declared
    /// header must carry all of its declared values. Undeclared request
    /// headers are ignored.
    pub fn matches_request(&self, request: &IncomingRequest) -> bool {
        if self.method != request.method || !paths_equal(&self.path, &request.path) {
            return false;
        }

        self.headers.iter().all(|(name, required)| {
            request
                .header(name)
                .map(|available| contains_all(available, required))
                .unwrap_or(false)
        })
    }

    /// Check whether two mappings are equivalent declarations.
    ///
    /// Header maps are normalized (keys and values lower-cased) and must be
    /// subsets of each other.
    pub fn matches_mapping(&self, other: &RequestMapping) -> bool {
        if self.method != other.method || !paths_equal(&self.path, &other.path) {
            return false;
        }

        let ours = lowercase_map(&self.headers);
        let theirs = lowercase_map(&other.headers);
        is_header_subset(&ours, &theirs) && is_header_subset(&theirs, &ours)
    }
}

/// Body of a canned response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Bytes sent as-is
    Inline {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    /// File read when the response is served
    File { path: PathBuf },
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Inline { data: Vec::new() }
    }
}

/// The canned reply paired with a [`RequestMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// HTTP status code; 0 leaves the transport default in place
    #[serde(default)]
    pub status: u16,
    /// Response headers, written verbatim
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default)]
    pub body: ResponseBody,
}

impl ResponseData {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Response with an inline text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status).with_body(body.into().into_bytes())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.body = ResponseBody::Inline { data: data.into() };
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = ResponseBody::File { path: path.into() };
        self
    }
}

/// The parts of an HTTP request that take part in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    method: String,
    path: String,
    /// Keys are stored lower-cased
    headers: HeaderMap,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Append a header value; the name is matched ignoring case.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Append every value of a header map.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        for (name, values) in lowercase_keys(headers) {
            self.headers.entry(name).or_default().extend(values);
        }
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Values of a header, looked up ignoring case.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(&name.to_lowercase()).map(Vec::as_slice)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
