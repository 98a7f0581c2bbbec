//! Class artifacts: files declaring CIM classes beyond the built-in hierarchy.
//!
//! ```yaml
//! classes:
//!   - name: Customer
//!     superclass: IdentifiedObject
//!     fields:
//!       - name: kind
//!         kind: string
//!       - name: ServiceLocation
//!         kind: reference
//! ```

use serde::{Deserialize, Serialize};

use crate::class::ClassDef;
use crate::{Error, Result};

/// Serialization format of a class artifact, inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Yaml,
    Toml,
}

impl ArtifactFormat {
    /// Format for a path or URL by its extension
    pub fn from_path(path: &str) -> Result<Self> {
        let extension = path
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Ok(ArtifactFormat::Json),
            "yml" | "yaml" => Ok(ArtifactFormat::Yaml),
            "toml" => Ok(ArtifactFormat::Toml),
            _ => Err(Error::UnknownArtifactFormat(path.to_string())),
        }
    }
}

/// Contents of one class artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassArtifact {
    #[serde(default)]
    pub classes: Vec<ClassDef>,
}

impl ClassArtifact {
    pub fn from_slice(bytes: &[u8], format: ArtifactFormat) -> Result<Self> {
        match format {
            ArtifactFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::Artifact(e.to_string()))
            }
            ArtifactFormat::Yaml => {
                serde_yml::from_slice(bytes).map_err(|e| Error::Artifact(e.to_string()))
            }
            ArtifactFormat::Toml => {
                let raw = std::str::from_utf8(bytes).map_err(|e| Error::Artifact(e.to_string()))?;
                toml::from_str(raw).map_err(|e| Error::Artifact(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::FieldKind;
    use rstest::rstest;

    #[rstest]
    #[case("classes.json", ArtifactFormat::Json)]
    #[case("/etc/cim/classes.YAML", ArtifactFormat::Yaml)]
    #[case("https://example.com/ext.yml", ArtifactFormat::Yaml)]
    #[case("ext.toml", ArtifactFormat::Toml)]
    fn test_format_from_path(#[case] path: &str, #[case] expected: ArtifactFormat) {
        assert_eq!(ArtifactFormat::from_path(path).unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        let result = ArtifactFormat::from_path("../../CIMScala/target/CIMScala.jar");
        assert!(matches!(result, Err(Error::UnknownArtifactFormat(_))));
    }

    #[test]
    fn test_parse_toml_artifact() {
        let raw = r#"
            [[classes]]
            name = "Customer"
            superclass = "IdentifiedObject"

            [[classes.fields]]
            name = "kind"
            kind = "string"

            [[classes.fields]]
            name = "priority"
            kind = "integer"
        "#;

        let artifact = ClassArtifact::from_slice(raw.as_bytes(), ArtifactFormat::Toml).unwrap();
        let customer = &artifact.classes[0];

        assert_eq!(customer.superclass.as_deref(), Some("IdentifiedObject"));
        assert_eq!(customer.field("priority").unwrap().kind, FieldKind::Integer);
        assert!(!customer.field("kind").unwrap().identifier);
    }

    #[test]
    fn test_parse_json_artifact() {
        let raw = r#"{"classes": [{"name": "Meter", "superclass": "IdentifiedObject",
            "fields": [{"name": "serialNumber", "kind": "string"}]}]}"#;

        let artifact = ClassArtifact::from_slice(raw.as_bytes(), ArtifactFormat::Json).unwrap();
        assert_eq!(artifact.classes.len(), 1);
    }

    #[test]
    fn test_invalid_field_kind() {
        let raw = "classes:\n  - name: Meter\n    superclass: IdentifiedObject\n    fields:\n      - name: x\n        kind: complex\n";

        let result = ClassArtifact::from_slice(raw.as_bytes(), ArtifactFormat::Yaml);
        assert!(matches!(result, Err(Error::Artifact(_))));
    }
}
