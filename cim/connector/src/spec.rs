//! Connection configuration.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use bon::Builder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Immutable configuration of a connection
///
/// Credentials are carried along but not used for authentication. Properties tune the backend:
///
/// - `datafusion.*` keys configure the DataFusion session
/// - `cim.memory_limit` caps the memory pool, e.g. `512m`, `4g` or plain bytes
/// - `storage.*` keys are handed to the object store, prefix stripped
///
/// Artifacts are locators of class definition files extending the built-in CIM classes.
///
/// # Examples
///
/// ```
/// use cim_connector::ConnectionSpec;
///
/// let spec = ConnectionSpec::builder()
///     .user_name("operator".to_string())
///     .properties([("datafusion.execution.target_partitions".to_string(), "2".to_string())].into())
///     .build();
///
/// assert_eq!(spec.user_name.as_deref(), Some("operator"));
/// assert!(spec.artifacts.is_empty());
/// ```
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Builder)]
pub struct ConnectionSpec {
    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Backend tuning options
    #[serde(default)]
    #[builder(default)]
    pub properties: HashMap<String, String>,

    /// Class artifact locators, paths or URLs of JSON/YAML/TOML class definitions
    #[serde(default)]
    #[builder(default)]
    pub artifacts: Vec<String>,
}

impl std::fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("properties", &self.properties)
            .field("artifacts", &self.artifacts)
            .finish()
    }
}

/// Serialization format of a connection configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Toml,
    Yaml,
    Unknown(String),
}

impl std::fmt::Display for SpecFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecFormat::Json => write!(f, "json"),
            SpecFormat::Toml => write!(f, "toml"),
            SpecFormat::Yaml => write!(f, "yaml"),
            SpecFormat::Unknown(format) => write!(f, "{format}"),
        }
    }
}

impl SpecFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path.as_ref().extension().and_then(|s| s.to_str());

        match ext {
            Some("toml") => SpecFormat::Toml,
            Some("json") => SpecFormat::Json,
            Some("yml") | Some("yaml") => SpecFormat::Yaml,
            ext => SpecFormat::Unknown(ext.unwrap_or("unknown_ext").to_string()),
        }
    }
}

impl ConnectionSpec {
    /// Load a configuration file, format inferred from the extension
    /// Provided params are substituted throughout the file (format: `${param}`)
    pub fn from_file<P: AsRef<Path>>(path: P, params: HashMap<String, String>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Template(format!("cannot read '{}': {e}", path.display())))?;

        Self::from_str(contents, SpecFormat::from_path(path), params)
    }

    /// Load a configuration from a string
    /// Provided params are substituted throughout the string (format: `${param}`)
    pub fn from_str<T: AsRef<str>>(
        value: T,
        format: SpecFormat,
        params: HashMap<String, String>,
    ) -> Result<Self> {
        let definition = substitute_params(value.as_ref(), params)?;
        debug!("Parsing connection configuration with format: {format}");

        match format {
            SpecFormat::Json => serde_json::from_str(definition.as_str())
                .map_err(|e| Error::Template(e.to_string())),
            SpecFormat::Yaml => serde_yml::from_str(definition.as_str())
                .map_err(|e| Error::Template(e.to_string())),
            SpecFormat::Toml => {
                toml::from_str(definition.as_str()).map_err(|e| Error::Template(e.to_string()))
            }
            SpecFormat::Unknown(format) => Err(Error::Template(format!(
                "unsupported configuration format '{format}'"
            ))),
        }
    }

    /// Name reported in connection metadata
    pub fn effective_user_name(&self) -> &str {
        self.user_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(crate::ANONYMOUS_USER)
    }
}

fn substitute_params(raw: &str, params: HashMap<String, String>) -> Result<String> {
    static PARAM_REGEX: OnceLock<Regex> = OnceLock::new();
    let mut definition = raw.to_string();

    params.into_iter().for_each(|(name, value)| {
        let template = format!("${{{name}}}");
        definition = definition.replace(template.as_str(), value.as_str());
    });

    let missing_params = PARAM_REGEX
        .get_or_init(|| Regex::new("\\$\\{([a-zA-Z0-9_]+)\\}").expect("invalid regex"))
        .captures_iter(definition.as_str())
        .filter_map(|capture| capture.get(1))
        .map(|param| param.as_str().to_string())
        .collect::<BTreeSet<String>>();

    if !missing_params.is_empty() {
        return Err(Error::MissingParams(missing_params));
    }

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_substitute_params() {
        let params = HashMap::from([("env".to_string(), "prod".to_string())]);
        let result = substitute_params("path: /data/${env}/grid.rdf", params).unwrap();

        assert_eq!(result, "path: /data/prod/grid.rdf");
    }

    #[test]
    fn test_missing_params() {
        let result = substitute_params("a: ${first}\nb: ${second}", HashMap::new());

        let Err(Error::MissingParams(missing)) = result else {
            panic!("expected missing params")
        };
        assert_eq!(
            missing,
            BTreeSet::from(["first".to_string(), "second".to_string()])
        );
    }

    #[rstest]
    #[case("spec.json", SpecFormat::Json)]
    #[case("spec.yml", SpecFormat::Yaml)]
    #[case("spec.yaml", SpecFormat::Yaml)]
    #[case("spec.toml", SpecFormat::Toml)]
    #[case("spec.ini", SpecFormat::Unknown("ini".to_string()))]
    fn test_format_from_path(#[case] path: &str, #[case] expected: SpecFormat) {
        assert_eq!(SpecFormat::from_path(path), expected);
    }

    #[test]
    fn test_from_yaml_with_params() {
        let raw = r#"
user_name: ${user}
password: secret
properties:
  datafusion.execution.batch_size: "1024"
artifacts:
  - /opt/cim/classes.yml
"#;
        let params = HashMap::from([("user".to_string(), "grid".to_string())]);
        let spec = ConnectionSpec::from_str(raw, SpecFormat::Yaml, params).unwrap();

        assert_eq!(spec.effective_user_name(), "grid");
        assert_eq!(spec.properties["datafusion.execution.batch_size"], "1024");
        assert_eq!(spec.artifacts, vec!["/opt/cim/classes.yml"]);
    }

    #[test]
    fn test_from_toml() {
        let raw = r#"
artifacts = []

[properties]
"cim.memory_limit" = "1g"
"#;
        let spec = ConnectionSpec::from_str(raw, SpecFormat::Toml, HashMap::new()).unwrap();

        assert_eq!(spec.properties["cim.memory_limit"], "1g");
        assert_eq!(spec.effective_user_name(), crate::ANONYMOUS_USER);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.json");
        std::fs::write(&path, r#"{"properties": {"storage.region": "${region}"}}"#).unwrap();

        let params = HashMap::from([("region".to_string(), "eu-central-1".to_string())]);
        let spec = ConnectionSpec::from_file(&path, params).unwrap();

        assert_eq!(spec.properties["storage.region"], "eu-central-1");
    }

    #[test]
    fn test_unknown_format() {
        let result = ConnectionSpec::from_str("", SpecFormat::Unknown("ini".into()), HashMap::new());
        assert!(matches!(result, Err(Error::Template(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let spec = ConnectionSpec::builder()
            .password("hunter2".to_string())
            .build();

        let debug = format!("{spec:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
