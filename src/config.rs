//! Configuration for the mock server.
//!
//! Defines inline mapping declarations, store selection, and logging settings.

use crate::mapping::{RequestMapping, ResponseBody, ResponseData};
use crate::normalize::HeaderMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Methods accepted in declarations.
pub const SUPPORTED_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "HEAD", "DELETE", "OPTIONS",
];

/// Main configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Mappings declared inline
    #[serde(default)]
    pub mappings: Vec<MappingDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Directory that relative response file paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, mapping) in self.mappings.iter().enumerate() {
            mapping
                .validate()
                .map_err(|e| anyhow::anyhow!("Mapping {}: {}", i, e))?;
        }
        Ok(())
    }

    /// Convert the inline declarations into mapping/response pairs.
    pub fn to_mappings(&self) -> anyhow::Result<Vec<(RequestMapping, ResponseData)>> {
        self.mappings
            .iter()
            .map(|m| m.to_mapping(&self.base_dir))
            .collect()
    }
}

/// A single inline mapping declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDefinition {
    /// HTTP method
    pub method: String,

    /// Request path
    pub path: String,

    /// Required request headers
    #[serde(default)]
    pub headers: HeaderMap,

    /// Query parameters (recorded, not matched)
    #[serde(default)]
    pub params: HeaderMap,

    /// Response to return
    pub response: ResponseDefinition,
}

impl MappingDefinition {
    /// Validate the mapping definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_method(&self.method)?;
        validate_path(&self.path)?;
        self.response.validate()
    }

    pub fn to_mapping(&self, base_dir: &Path) -> anyhow::Result<(RequestMapping, ResponseData)> {
        let request = RequestMapping {
            method: self.method.clone(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            params: self.params.clone(),
        };
        Ok((request, self.response.to_response(base_dir)?))
    }
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code; 0 keeps the server default
    #[serde(default)]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HeaderMap,

    /// Response body
    #[serde(default)]
    pub body: Option<BodyDefinition>,
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_status(self.status)
    }

    pub fn to_response(&self, base_dir: &Path) -> anyhow::Result<ResponseData> {
        let body = match &self.body {
            Some(body) => body.to_body(base_dir)?,
            None => ResponseBody::default(),
        };
        Ok(ResponseData {
            status: self.status,
            headers: self.headers.clone(),
            body,
        })
    }
}

/// Response body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyDefinition {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
    /// Served from a file, relative to the configuration file
    File { path: PathBuf },
}

impl BodyDefinition {
    /// Resolve into a stored body. Files are referenced, not read.
    pub fn to_body(&self, base_dir: &Path) -> anyhow::Result<ResponseBody> {
        let data = match self {
            BodyDefinition::Text { content } => content.as_bytes().to_vec(),
            BodyDefinition::Json { content } => serde_json::to_vec(content)?,
            BodyDefinition::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map_err(|e| anyhow::anyhow!("Invalid base64: {}", e))?
            }
            BodyDefinition::File { path } => {
                return Ok(ResponseBody::File {
                    path: base_dir.join(path),
                })
            }
        };
        Ok(ResponseBody::Inline { data })
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every matched request
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Mapping store selection
    #[serde(default)]
    pub store: StoreSettings,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            store: StoreSettings::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Which backend holds the mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Mappings are lost on exit
    #[default]
    Memory,
    /// Mappings are persisted to a SQLite file
    Durable,
}

/// Mapping store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    #[serde(default)]
    pub kind: StoreKind,

    /// Directory holding the durable store file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Version tag the store file name is derived from
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            data_dir: default_data_dir(),
            version: default_version(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub fn validate_method(method: &str) -> anyhow::Result<()> {
    if !SUPPORTED_METHODS.contains(&method) {
        anyhow::bail!(
            "Unsupported method {:?} (expected one of {})",
            method,
            SUPPORTED_METHODS.join(", ")
        );
    }
    Ok(())
}

pub fn validate_path(path: &str) -> anyhow::Result<()> {
    if !path.starts_with('/') {
        anyhow::bail!("Path should start with '/': {:?}", path);
    }
    Ok(())
}

pub fn validate_status(status: u16) -> anyhow::Result<()> {
    if status != 0 && !(100..=599).contains(&status) {
        anyhow::bail!("Invalid status code: {}", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_mapping() {
        let yaml = r#"
mappings:
  - method: GET
    path: /items
    response:
      status: 200
      body:
        type: text
        content: ok
"#;
        let config: MockServerConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        let mappings = config.to_mappings().unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].0, RequestMapping::new("GET", "/items"));
        assert_eq!(mappings[0].1, ResponseData::text(200, "ok"));
    }

    #[test]
    fn test_parse_headers_and_json_body() {
        let yaml = r#"
mappings:
  - method: POST
    path: /secure
    headers:
      X-Auth: [token1, token2]
    response:
      headers:
        Content-Type: [application/json]
      body:
        type: json
        content:
          message: success
"#;
        let config: MockServerConfig = serde_yaml::from_str(yaml).unwrap();
        let (request, response) = config.to_mappings().unwrap().remove(0);
        assert_eq!(
            request.headers.get("X-Auth"),
            Some(&vec!["token1".to_string(), "token2".to_string()])
        );
        assert_eq!(response.status, 0);
        match response.body {
            ResponseBody::Inline { data } => {
                let json: serde_json::Value = serde_json::from_slice(&data).unwrap();
                assert_eq!(json["message"], "success");
            }
            other => panic!("Expected inline body, got {:?}", other),
        }
    }

    #[test]
    fn test_file_body_resolved_against_base_dir() {
        let body = BodyDefinition::File {
            path: PathBuf::from("body.json"),
        };
        assert_eq!(
            body.to_body(Path::new("/srv/fixtures")).unwrap(),
            ResponseBody::File {
                path: PathBuf::from("/srv/fixtures/body.json")
            }
        );
    }

    #[test]
    fn test_base64_body() {
        let body = BodyDefinition::Base64 {
            content: "aGVsbG8=".to_string(),
        };
        assert_eq!(
            body.to_body(Path::new(".")).unwrap(),
            ResponseBody::Inline {
                data: b"hello".to_vec()
            }
        );

        let bad = BodyDefinition::Base64 {
            content: "not base64!".to_string(),
        };
        assert!(bad.to_body(Path::new(".")).is_err());
    }

    #[test]
    fn test_parse_store_settings() {
        let yaml = r#"
settings:
  log_matches: false
  store:
    kind: durable
    data_dir: /var/lib/rest-mock
"#;
        let config: MockServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert_eq!(config.settings.store.kind, StoreKind::Durable);
        assert_eq!(config.settings.store.data_dir, PathBuf::from("/var/lib/rest-mock"));
        assert_eq!(config.settings.store.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config: MockServerConfig =
            serde_yaml::from_str(include_str!("../config/default-config.yaml")).unwrap();
        config.validate().unwrap();
        let mappings = config.to_mappings().unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].1, ResponseData::text(201, "Success"));
        assert_eq!(config.settings.store.kind, StoreKind::Memory);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let yaml = r#"
mappings:
  - method: GET
    path: /items
    priority: 3
    response: {}
"#;
        assert!(serde_yaml::from_str::<MockServerConfig>(yaml).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut mapping = MappingDefinition {
            method: "GET".to_string(),
            path: "/ok".to_string(),
            headers: HeaderMap::new(),
            params: HeaderMap::new(),
            response: ResponseDefinition::default(),
        };
        assert!(mapping.validate().is_ok());

        mapping.method = "FETCH".to_string();
        assert!(mapping.validate().is_err());

        mapping.method = "GET".to_string();
        mapping.path = "no-slash".to_string();
        assert!(mapping.validate().is_err());

        mapping.path = "/ok".to_string();
        mapping.response.status = 42;
        let config = MockServerConfig {
            mappings: vec![mapping],
            ..MockServerConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.starts_with("Mapping 0:"));
    }
}
