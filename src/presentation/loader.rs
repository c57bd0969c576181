//! Service template document loading.
//!
//! Reads a YAML service template from disk (or from a string) into a
//! [`ServiceTemplateDocument`].

use crate::error::{ModelError, Result};
use crate::presentation::schema::ServiceTemplateDocument;
use std::fs;
use std::path::Path;

/// Load a service template document from a YAML file.
pub fn load_document(path: &Path) -> Result<ServiceTemplateDocument> {
    if !path.exists() {
        return Err(ModelError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path)?;
    let mut document = parse_document(&content).map_err(|e| ModelError::DocumentParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    document.location = Some(path.to_path_buf());

    tracing::debug!(
        "loaded {} ({} node templates)",
        path.display(),
        document
            .topology_template
            .as_ref()
            .map_or(0, |t| t.node_templates.len())
    );

    Ok(document)
}

/// Parse a service template document from YAML text.
///
/// An empty document parses to an empty template.
pub fn parse_document(content: &str) -> std::result::Result<ServiceTemplateDocument, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(ServiceTemplateDocument::default());
    }
    serde_yaml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_sets_location() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "tosca_definitions_version: tosca_simple_yaml_1_0\ndescription: demo"
        )
        .unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.description.as_deref(), Some("demo"));
        assert_eq!(doc.location.as_deref(), Some(file.path()));
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = load_document(&temp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ModelError::DocumentNotFound { .. }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "node_types: [unclosed").unwrap();

        let err = load_document(file.path()).unwrap_err();
        match err {
            ModelError::DocumentParse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn empty_document_is_empty_template() {
        let doc = parse_document("   \n").unwrap();
        assert!(doc.node_types.is_empty());
        assert!(doc.topology_template.is_none());
    }
}
