//! Fixture tree loading.
//!
//! A responses folder holds one directory per endpoint. Each directory carries
//! an `api.yml` describing the request to match and the response to send; the
//! response body may live next to it in a separate file.
//!
//! ```yaml
//! method: GET
//! path: /items
//! expects:
//!   headers:
//!     - key: X-Auth
//!       value: token1
//! response:
//!   status: 200
//!   headers:
//!     - key: Content-Type
//!       value: application/json
//!   file: items.json
//! ```

use crate::config::{validate_method, validate_path, validate_status};
use crate::mapping::{RequestMapping, ResponseBody, ResponseData};
use crate::normalize::HeaderMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the endpoint description inside each fixture directory.
pub const ENDPOINT_FILE: &str = "api.yml";

/// One `api.yml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointFixture {
    #[serde(default = "default_method")]
    pub method: String,

    pub path: String,

    #[serde(default)]
    pub expects: Expects,

    #[serde(default)]
    pub response: FixtureResponse,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Request constraints of a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Expects {
    #[serde(default)]
    pub headers: Vec<KeyValue>,

    #[serde(default)]
    pub params: Vec<KeyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Response half of a fixture.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FixtureResponse {
    #[serde(default)]
    pub status: u16,

    #[serde(default)]
    pub headers: Vec<KeyValue>,

    /// Inline body
    #[serde(default)]
    pub data: Option<String>,

    /// Body file relative to the endpoint directory; takes precedence over `data`
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Group repeated keys into a multi-value map, keeping value order.
fn group(pairs: &[KeyValue]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for pair in pairs {
        map.entry(pair.key.clone())
            .or_default()
            .push(pair.value.clone());
    }
    map
}

impl EndpointFixture {
    /// Parse and validate the `api.yml` of one endpoint directory.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let file = dir.join(ENDPOINT_FILE);
        let content = std::fs::read_to_string(&file)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
        let fixture: Self = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", file.display(), e))?;
        fixture.validate()?;
        Ok(fixture)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_method(&self.method)?;
        validate_path(&self.path)?;
        validate_status(self.response.status)
    }

    /// Build the mapping; a body file is resolved against `dir`.
    pub fn to_mapping(&self, dir: &Path) -> (RequestMapping, ResponseData) {
        let request = RequestMapping {
            method: self.method.clone(),
            path: self.path.clone(),
            headers: group(&self.expects.headers),
            params: group(&self.expects.params),
        };

        let body = match (&self.response.file, &self.response.data) {
            (Some(file), _) => ResponseBody::File {
                path: dir.join(file),
            },
            (None, Some(data)) => ResponseBody::Inline {
                data: data.clone().into_bytes(),
            },
            (None, None) => ResponseBody::default(),
        };

        let response = ResponseData {
            status: self.response.status,
            headers: group(&self.response.headers),
            body,
        };
        (request, response)
    }
}

/// Load every endpoint under `responses_dir`, sorted by directory name.
///
/// Entries that are not directories, or whose `api.yml` is missing or
/// invalid, are logged and skipped. A missing responses folder is an error.
pub fn load_fixture_tree(
    responses_dir: &Path,
) -> anyhow::Result<Vec<(RequestMapping, ResponseData)>> {
    if !responses_dir.is_dir() {
        anyhow::bail!(
            "Failed to locate responses directory {}",
            responses_dir.display()
        );
    }

    let mut entries = std::fs::read_dir(responses_dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut mappings = Vec::new();
    for entry in entries {
        let dir = entry.path();
        if !dir.is_dir() {
            debug!(path = %dir.display(), "Skipping non-directory entry");
            continue;
        }

        match EndpointFixture::from_dir(&dir) {
            Ok(fixture) => mappings.push(fixture.to_mapping(&dir)),
            Err(e) => warn!(path = %dir.display(), error = %e, "Skipping fixture"),
        }
    }

    info!(
        path = %responses_dir.display(),
        endpoints = mappings.len(),
        "Loaded fixture tree"
    );
    Ok(mappings)
}
