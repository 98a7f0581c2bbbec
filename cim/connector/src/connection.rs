use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::BackendContext;
use crate::interaction::Interaction;
use crate::registry::{Fingerprint, HandleKind, Lease};
use crate::{Error, Result};

/// Name of the engine behind every connection
pub const PRODUCT_NAME: &str = "DataFusion";

/// User name reported when the configuration has none
pub const ANONYMOUS_USER: &str = "anonymous";

/// Information about the backend a connection talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub product_name: String,
    pub product_version: String,
    pub user_name: String,
}

/// A leased handle on a backend context
///
/// Must be closed with [`Connection::close`]; dropping an open connection releases the lease
/// and logs a warning.
pub struct Connection {
    id: Uuid,
    user_name: String,
    lease: Option<Lease>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(backend: Arc<BackendContext>, user_name: String) -> Self {
        let id = Uuid::new_v4();
        debug!(connection_id = %id, fingerprint = %backend.fingerprint(), "Connection opened");

        Self {
            id,
            user_name,
            lease: Some(Lease::new(backend, HandleKind::Connection)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn metadata(&self) -> Result<Metadata> {
        self.backend()?;

        Ok(Metadata {
            product_name: PRODUCT_NAME.to_string(),
            product_version: datafusion::DATAFUSION_VERSION.to_string(),
            user_name: self.user_name.clone(),
        })
    }

    pub fn create_interaction(&self) -> Result<Interaction> {
        let backend = self.backend()?;
        Ok(Interaction::new(self.id, Arc::clone(backend)))
    }

    /// Fingerprint of the backend context this connection is bound to
    pub fn fingerprint(&self) -> Result<&Fingerprint> {
        Ok(self.backend()?.fingerprint())
    }

    /// Whether the connection can still be used
    pub fn is_valid(&self) -> bool {
        self.lease.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.lease.is_none()
    }

    /// Release this connection's lease on the backend context
    /// Closing a closed connection does nothing
    pub fn close(&mut self) {
        if self.lease.take().is_some() {
            debug!(connection_id = %self.id, "Connection closed");
        }
    }

    fn backend(&self) -> Result<&Arc<BackendContext>> {
        self.lease
            .as_ref()
            .map(Lease::backend)
            .ok_or(Error::ConnectionClosed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.lease.is_some() {
            warn!(connection_id = %self.id, "Connection dropped without close, releasing lease");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ContextPolicy, ContextRegistry};
    use crate::spec::ConnectionSpec;
    use tracing_test::traced_test;

    async fn connection(registry: &ContextRegistry) -> Connection {
        let backend = registry
            .acquire(&ConnectionSpec::default(), ContextPolicy::Shared)
            .await
            .unwrap();

        Connection::new(backend, ANONYMOUS_USER.to_string())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_drop_without_close_releases_lease() {
        let registry = ContextRegistry::new();
        let connection = connection(&registry).await;
        assert_eq!(registry.stats().open_connections(), 1);

        drop(connection);

        assert!(logs_contain("Connection dropped without close"));
        assert_eq!(registry.stats().open_connections(), 0);
        assert_eq!(registry.stats().teardowns(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_drop_after_close_is_quiet() {
        let registry = ContextRegistry::new();
        let mut connection = connection(&registry).await;

        connection.close();
        drop(connection);

        assert!(!logs_contain("Connection dropped without close"));
    }

    #[tokio::test]
    async fn test_interaction_keeps_connection_id() {
        let registry = ContextRegistry::new();
        let mut connection = connection(&registry).await;
        let mut interaction = connection.create_interaction().unwrap();

        assert_eq!(interaction.connection_id(), connection.id());
        assert_eq!(registry.stats().open_interactions(), 1);

        interaction.close();
        connection.close();
    }
}
