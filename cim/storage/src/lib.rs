//! Storage backends and file locators for the CIM connector
//!
//! This crate resolves file locators to bytes through the `object_store` crate:
//! - Local filesystem (`file://` or a plain path, always available)
//! - HTTP and HTTPS (always available)
//! - Amazon S3 (`s3://`, `s3a://`, with the 's3' feature)
//!
//! Any other scheme (for instance `hdfs://`) is rejected with [`Error::UnsupportedScheme`].

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use object_store::{path::Path as ObjectPath, ObjectStore};
use tracing::{debug, instrument, warn};
use url::Url;

pub mod error;
mod location;

#[cfg(feature = "s3")]
mod s3;

pub use error::Error;
pub use location::Location;

#[cfg(feature = "s3")]
pub use s3::S3Provider;

pub type Result<T> = core::result::Result<T, Error>;

/// Trait for object storage providers.
///
/// Each provider decides which URL schemes it handles and builds a store for them.
pub trait ObjectStoreProvider: Send + Sync {
    /// Check if this provider supports the given URL scheme.
    fn supports_scheme(&self, scheme: &str) -> bool;

    /// Create an object store instance for the given location and options.
    fn create_store(
        &self,
        location: &Url,
        options: &HashMap<String, String>,
    ) -> Result<Arc<dyn ObjectStore>>;

    /// Path of the object inside the store created for `location`.
    fn object_path(&self, location: &Url) -> Result<ObjectPath> {
        Ok(ObjectPath::from_url_path(location.path())?)
    }
}

/// Registry for object storage providers.
///
/// Providers are consulted in order and the first one that supports the scheme wins.
pub struct ObjectStoreRegistry {
    providers: Vec<Box<dyn ObjectStoreProvider>>,
}

impl ObjectStoreRegistry {
    /// Create a new registry with all providers enabled by feature flags.
    #[allow(clippy::vec_init_then_push)]
    pub fn new() -> Self {
        let mut providers: Vec<Box<dyn ObjectStoreProvider>> = Vec::new();

        #[cfg(feature = "s3")]
        providers.push(Box::new(S3Provider));

        providers.push(Box::new(HttpProvider));
        providers.push(Box::new(LocalFileProvider));

        Self { providers }
    }

    fn provider(&self, location: &Url) -> Result<&dyn ObjectStoreProvider> {
        self.providers
            .iter()
            .find(|provider| provider.supports_scheme(location.scheme()))
            .map(|provider| provider.as_ref())
            .ok_or_else(|| Error::UnsupportedScheme(location.scheme().to_string()))
    }

    /// Create an object store for the given location.
    pub fn create_store(
        &self,
        location: &Url,
        options: &HashMap<String, String>,
    ) -> Result<Arc<dyn ObjectStore>> {
        self.provider(location)?.create_store(location, options)
    }

    /// Resolve a location to a store and the object path inside it.
    pub fn resolve(
        &self,
        location: &Url,
        options: &HashMap<String, String>,
    ) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
        let provider = self.provider(location)?;
        let store = provider.create_store(location, options)?;
        let path = provider.object_path(location)?;

        Ok((store, path))
    }
}

impl Default for ObjectStoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider for the local file system.
pub struct LocalFileProvider;

impl ObjectStoreProvider for LocalFileProvider {
    fn supports_scheme(&self, scheme: &str) -> bool {
        scheme == "file"
    }

    fn create_store(
        &self,
        location: &Url,
        _options: &HashMap<String, String>,
    ) -> Result<Arc<dyn ObjectStore>> {
        match location.scheme() {
            "file" => Ok(Arc::new(object_store::local::LocalFileSystem::new())),
            scheme => Err(Error::UnsupportedScheme(scheme.to_string())),
        }
    }
}

/// Provider for plain HTTP(S) servers.
///
/// The store is rooted at the origin of the location, so the object path is the URL path.
pub struct HttpProvider;

impl ObjectStoreProvider for HttpProvider {
    fn supports_scheme(&self, scheme: &str) -> bool {
        matches!(scheme, "http" | "https")
    }

    fn create_store(
        &self,
        location: &Url,
        options: &HashMap<String, String>,
    ) -> Result<Arc<dyn ObjectStore>> {
        if !options.is_empty() {
            warn!(
                "Ignoring {} storage option(s) for http location",
                options.len()
            );
        }

        let origin = location.origin().ascii_serialization();
        object_store::http::HttpBuilder::new()
            .with_url(origin)
            .build()
            .map(|store| Arc::new(store) as Arc<dyn ObjectStore>)
            .map_err(|e| Error::ObjectStoreCreation(e.to_string()))
    }
}

static GLOBAL_REGISTRY: OnceLock<ObjectStoreRegistry> = OnceLock::new();

/// Get the global object store registry, creating it on first access.
pub fn global_registry() -> &'static ObjectStoreRegistry {
    GLOBAL_REGISTRY.get_or_init(ObjectStoreRegistry::new)
}

/// Read the whole object behind `location`.
#[instrument(skip_all, fields(location = %location), err)]
pub async fn fetch(location: &Location, options: &HashMap<String, String>) -> Result<Vec<u8>> {
    let (store, path) = global_registry().resolve(location, options)?;

    let bytes = store.get(&path).await?.bytes().await?;
    debug!(size = bytes.len(), "Fetched object");

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case("file", true)]
    #[case("memory", false)]
    #[case("s3", false)]
    #[case("hdfs", false)]
    fn test_local_file_provider_supports_schemes(#[case] scheme: &str, #[case] expected: bool) {
        assert_eq!(LocalFileProvider.supports_scheme(scheme), expected);
    }

    #[rstest]
    #[case("http", true)]
    #[case("https", true)]
    #[case("file", false)]
    fn test_http_provider_supports_schemes(#[case] scheme: &str, #[case] expected: bool) {
        assert_eq!(HttpProvider.supports_scheme(scheme), expected);
    }

    #[test]
    fn test_registry_rejects_unsupported_scheme() {
        let registry = ObjectStoreRegistry::new();
        let url = Url::parse("hdfs://sandbox:9000/data/export.rdf").unwrap();

        let error = registry.create_store(&url, &HashMap::new()).unwrap_err();
        assert!(
            error.to_string().contains("hdfs"),
            "Expected error message to contain 'hdfs', got: {error}"
        );
    }

    #[test]
    fn test_registry_resolves_file_path() {
        let registry = ObjectStoreRegistry::new();
        let url = Url::parse("file:///tmp/grid/export.rdf").unwrap();

        let (_, path) = registry.resolve(&url, &HashMap::new()).unwrap();
        assert_eq!(path.as_ref(), "tmp/grid/export.rdf");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<rdf:RDF/>").unwrap();

        let location = Location::try_from(file.path().to_str().unwrap()).unwrap();
        let bytes = fetch(&location, &HashMap::new()).await.unwrap();

        assert_eq!(bytes, b"<rdf:RDF/>");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let location = Location::try_from(dir.path().join("missing.rdf").to_str().unwrap()).unwrap();

        let error = fetch(&location, &HashMap::new()).await.unwrap_err();
        assert!(matches!(error, Error::ObjectStore(_)));
    }
}
