//! Document acquisition.
//!
//! The comparison core only ever sees fully materialized bytes. Fetching a
//! remote spec or collection, with whatever retry policy that needs, is the job
//! of a [`SourceProvider`].

use crate::error::ContractError;
use crate::loader::ContractFormat;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies a contract document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    LocalPath(PathBuf),
    /// A spec held by a remote registry: `spec:<id>`.
    RemoteSpec(String),
    /// A request collection held by a remote workspace:
    /// `collection:<id>[@<version>]`.
    RemoteCollection { id: String, version: Option<String> },
}

impl DocumentId {
    pub fn parse(input: &str) -> Self {
        if let Some(id) = input.strip_prefix("spec:") {
            return DocumentId::RemoteSpec(id.to_string());
        }
        if let Some(rest) = input.strip_prefix("collection:") {
            let (id, version) = match rest.split_once('@') {
                Some((id, version)) => (id, Some(version.to_string())),
                None => (rest, None),
            };
            return DocumentId::RemoteCollection {
                id: id.to_string(),
                version,
            };
        }
        DocumentId::LocalPath(PathBuf::from(input))
    }

    /// Format implied by the identifier itself, if any.
    pub fn implied_format(&self) -> Option<ContractFormat> {
        match self {
            DocumentId::RemoteCollection { .. } => Some(ContractFormat::Collection),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::LocalPath(path) => write!(f, "{}", path.display()),
            DocumentId::RemoteSpec(id) => write!(f, "spec:{id}"),
            DocumentId::RemoteCollection { id, version: Some(v) } => write!(f, "collection:{id}@{v}"),
            DocumentId::RemoteCollection { id, version: None } => write!(f, "collection:{id}"),
        }
    }
}

impl std::str::FromStr for DocumentId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: DocumentId,
    pub bytes: Vec<u8>,
    pub format: ContractFormat,
}

pub trait SourceProvider {
    /// Materializes a document. Fails fast; no partial documents.
    fn fetch(&self, id: &DocumentId, format: Option<ContractFormat>) -> Result<SourceDocument, ContractError>;
}

/// Reads local files. Remote identifiers are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileProvider;

impl SourceProvider for LocalFileProvider {
    fn fetch(&self, id: &DocumentId, format: Option<ContractFormat>) -> Result<SourceDocument, ContractError> {
        let DocumentId::LocalPath(path) = id else {
            return Err(ContractError::Source {
                id: id.to_string(),
                message: "remote documents need a registry provider; only local files are supported"
                    .to_string(),
            });
        };
        let bytes = read(path)?;
        let format = format
            .or_else(|| id.implied_format())
            .unwrap_or_else(|| ContractFormat::detect(Some(path), &bytes));
        tracing::debug!(path = %path.display(), bytes = bytes.len(), format = %format, "read local document");
        Ok(SourceDocument {
            id: id.clone(),
            bytes,
            format,
        })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ContractError> {
    std::fs::read(path).map_err(|source| ContractError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(
            DocumentId::parse("spec:billing-v2"),
            DocumentId::RemoteSpec("billing-v2".to_string())
        );
        assert_eq!(
            DocumentId::parse("collection:abc@3"),
            DocumentId::RemoteCollection {
                id: "abc".to_string(),
                version: Some("3".to_string())
            }
        );
        assert_eq!(
            DocumentId::parse("./api/openapi.yaml"),
            DocumentId::LocalPath(PathBuf::from("./api/openapi.yaml"))
        );
        assert_eq!(DocumentId::parse("collection:abc").to_string(), "collection:abc");
    }

    #[test]
    fn test_remote_ids_fail_locally() {
        let err = LocalFileProvider
            .fetch(&DocumentId::parse("spec:billing"), None)
            .unwrap_err();
        assert!(matches!(err, ContractError::Source { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_local_file_format_detection() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "openapi: 3.0.0\npaths: {{}}").unwrap();
        let id = DocumentId::LocalPath(file.path().to_path_buf());
        let doc = LocalFileProvider.fetch(&id, None).unwrap();
        assert_eq!(doc.format, ContractFormat::OpenApiYaml);
        assert!(!doc.bytes.is_empty());
    }
}
