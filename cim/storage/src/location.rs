//! Location type that handles both file paths and URLs

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use url::Url;

use crate::error::Error;

/// A file locator that can be either a local path or a URL
///
/// Local paths, absolute or relative to the working directory, become `file://` URLs.
///
/// # Examples
///
/// ```
/// use cim_storage::Location;
///
/// let remote: Location = "s3://grid/exports/feeder.rdf".try_into().unwrap();
/// assert_eq!(remote.scheme(), "s3");
///
/// let local: Location = "/data/feeder.rdf".try_into().unwrap();
/// assert_eq!(local.scheme(), "file");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location(pub Url);

impl TryFrom<&str> for Location {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidLocation("empty location".to_string()));
        }

        // windows drive letters parse as a one letter scheme
        if let Ok(url) = Url::parse(s) {
            if url.scheme().len() > 1 {
                return Ok(Location(url));
            }
        }

        let path = Path::new(s);
        let url = if path.is_absolute() {
            Url::from_file_path(path)
        } else {
            let current_dir = std::env::current_dir().map_err(|e| {
                Error::InvalidLocation(format!("cannot get current directory: {e}"))
            })?;
            Url::from_file_path(current_dir.join(path))
        }
        .map_err(|_| Error::InvalidLocation(format!("invalid path: {s}")))?;

        Ok(Location(url))
    }
}

impl TryFrom<String> for Location {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Location::try_from(s.as_str())
    }
}

impl From<Url> for Location {
    fn from(url: Url) -> Self {
        Location(url)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Location::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<Url> for Location {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}

impl std::ops::Deref for Location {
    type Target = Url;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hdfs_url_is_kept_verbatim() {
        let location: Location = "hdfs://sandbox:9000/data/export.rdf".try_into().unwrap();
        assert_eq!(location.scheme(), "hdfs");
        assert_eq!(location.host_str(), Some("sandbox"));
        assert_eq!(location.port(), Some(9000));
        assert_eq!(location.path(), "/data/export.rdf");
    }

    #[test]
    fn test_absolute_file_path() {
        let location: Location = "/tmp/export.rdf".try_into().unwrap();
        assert_eq!(location.scheme(), "file");
        assert!(location.path().ends_with("/tmp/export.rdf"));
    }

    #[test]
    fn test_relative_file_path() {
        let location: Location = "./export.rdf".try_into().unwrap();
        assert_eq!(location.scheme(), "file");
        assert!(location.path().ends_with("/export.rdf"));
    }

    #[test]
    fn test_empty_location_is_rejected() {
        let result = Location::try_from("   ");
        assert!(matches!(result, Err(Error::InvalidLocation(_))));
    }

    #[test]
    fn test_serialization() {
        let location: Location = "https://example.com/export.rdf".try_into().unwrap();
        let json = serde_json::to_string(&location).unwrap();
        assert_eq!(json, r#""https://example.com/export.rdf""#);

        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(back, location);
    }
}
