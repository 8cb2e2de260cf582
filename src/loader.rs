//! Document loaders: turn raw bytes into a [`RawNode`] tree.
//!
//! Loading is purely syntactic. Unknown fields are preserved and no semantic
//! validation happens here; the normalizer decides what the tree means.

use crate::error::ContractError;
use crate::raw::{Number, RawMap, RawNode};
use std::fmt;
use std::path::Path;

/// The closed set of contract document formats the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ContractFormat {
    /// OpenAPI 3.x or Swagger 2.0 document encoded as JSON.
    #[serde(rename = "openapi-json")]
    OpenApiJson,
    /// OpenAPI 3.x or Swagger 2.0 document encoded as YAML.
    #[serde(rename = "openapi-yaml")]
    OpenApiYaml,
    /// Request collection (v2.x collection JSON).
    #[serde(rename = "collection")]
    Collection,
}

impl ContractFormat {
    pub fn id(&self) -> &'static str {
        match self {
            ContractFormat::OpenApiJson => "openapi-json",
            ContractFormat::OpenApiYaml => "openapi-yaml",
            ContractFormat::Collection => "collection",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "openapi-json" => Some(ContractFormat::OpenApiJson),
            "openapi-yaml" => Some(ContractFormat::OpenApiYaml),
            "collection" => Some(ContractFormat::Collection),
            _ => None,
        }
    }

    /// Loader responsible for this format.
    pub fn loader(&self) -> &'static dyn DocumentLoader {
        match self {
            ContractFormat::OpenApiJson => &OPENAPI_JSON,
            ContractFormat::OpenApiYaml => &YamlLoader,
            ContractFormat::Collection => &COLLECTION_JSON,
        }
    }

    /// Guesses the format from a file name and the first bytes of content.
    ///
    /// YAML extensions win outright. Otherwise JSON content that carries
    /// collection markers is a collection, other JSON is an OpenAPI document,
    /// and anything that does not start like JSON is treated as YAML.
    pub fn detect(path: Option<&Path>, bytes: &[u8]) -> Self {
        let extension = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if matches!(extension.as_deref(), Some("yaml" | "yml")) {
            return ContractFormat::OpenApiYaml;
        }

        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return ContractFormat::OpenApiYaml;
        }
        if text.contains("\"_postman_id\"") || text.contains("schema.getpostman.com") {
            return ContractFormat::Collection;
        }
        ContractFormat::OpenApiJson
    }
}

impl fmt::Display for ContractFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for ContractFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("Unknown contract format: {s}"))
    }
}

/// Shared interface of the per-format loaders.
pub trait DocumentLoader: Sync {
    fn format(&self) -> ContractFormat;

    fn load(&self, bytes: &[u8]) -> Result<RawNode, ContractError>;
}

/// Parses `bytes` under `format` into a generic tree.
pub fn load(bytes: &[u8], format: ContractFormat) -> Result<RawNode, ContractError> {
    let loader = format.loader();
    tracing::debug!(format = %format, bytes = bytes.len(), "loading document");
    loader.load(bytes)
}

fn decode_utf8(bytes: &[u8], format: ContractFormat) -> Result<&str, ContractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ContractError::Parse {
        format,
        line: None,
        column: None,
        offset: Some(e.valid_up_to()),
        message: "input is not valid UTF-8".to_string(),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

pub struct JsonLoader {
    pub format: ContractFormat,
}

static OPENAPI_JSON: JsonLoader = JsonLoader {
    format: ContractFormat::OpenApiJson,
};

static COLLECTION_JSON: JsonLoader = JsonLoader {
    format: ContractFormat::Collection,
};

impl DocumentLoader for JsonLoader {
    fn format(&self) -> ContractFormat {
        self.format
    }

    fn load(&self, bytes: &[u8]) -> Result<RawNode, ContractError> {
        let text = decode_utf8(bytes, self.format)?;
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ContractError::Parse {
                format: self.format,
                line: Some(e.line()),
                column: Some(e.column()),
                offset: None,
                message: e.to_string(),
            })?;
        Ok(from_json(value))
    }
}

pub struct YamlLoader;

impl DocumentLoader for YamlLoader {
    fn format(&self) -> ContractFormat {
        ContractFormat::OpenApiYaml
    }

    fn load(&self, bytes: &[u8]) -> Result<RawNode, ContractError> {
        let text = decode_utf8(bytes, ContractFormat::OpenApiYaml)?;
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
            let location = e.location();
            ContractError::Parse {
                format: ContractFormat::OpenApiYaml,
                line: location.as_ref().map(|l| l.line()),
                column: location.as_ref().map(|l| l.column()),
                offset: location.as_ref().map(|l| l.index()),
                message: e.to_string(),
            }
        })?;
        Ok(from_yaml(value))
    }
}

/// Converts a parsed JSON value into a raw node.
pub fn from_json(value: serde_json::Value) -> RawNode {
    match value {
        serde_json::Value::Null => RawNode::Null,
        serde_json::Value::Bool(b) => RawNode::Bool(b),
        serde_json::Value::Number(n) => RawNode::Number(json_number(&n)),
        serde_json::Value::String(s) => RawNode::String(s),
        serde_json::Value::Array(items) => {
            RawNode::Sequence(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => {
            RawNode::Mapping(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn json_number(n: &serde_json::Number) -> Number {
    match (n.as_i64(), n.as_u64()) {
        (Some(i), _) => Number::from_i64(i),
        (_, Some(u)) => Number::from_u64(u),
        _ => Number::new(n.as_f64().unwrap_or(0.0)),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Number {
    match (n.as_i64(), n.as_u64()) {
        (Some(i), _) => Number::from_i64(i),
        (_, Some(u)) => Number::from_u64(u),
        _ => Number::new(n.as_f64().unwrap_or(0.0)),
    }
}

/// Converts a parsed YAML value into a raw node. Non-string mapping keys
/// (`200:` is an integer in YAML) are rendered as their scalar text.
pub fn from_yaml(value: serde_yaml::Value) -> RawNode {
    match value {
        serde_yaml::Value::Null => RawNode::Null,
        serde_yaml::Value::Bool(b) => RawNode::Bool(b),
        serde_yaml::Value::Number(n) => RawNode::Number(yaml_number(&n)),
        serde_yaml::Value::String(s) => RawNode::String(s),
        serde_yaml::Value::Sequence(items) => {
            RawNode::Sequence(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = RawMap::new();
            for (key, value) in map {
                out.insert(yaml_key(key), from_yaml(value));
            }
            RawNode::Mapping(out)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
