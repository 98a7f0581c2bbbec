use std::sync::Arc;

use tracing::{info, instrument};

use crate::connection::Connection;
use crate::record::RecordFactory;
use crate::registry::{ContextPolicy, ContextRegistry};
use crate::spec::ConnectionSpec;
use crate::Result;

/// Creates connections from configurations
///
/// Backend contexts are obtained from a [`ContextRegistry`]. Factories sharing a registry share
/// its contexts when their policy is [`ContextPolicy::Shared`].
///
/// ```no_run
/// use cim_connector::prelude::*;
///
/// # async fn run() -> cim_connector::Result<()> {
/// let factory = ConnectionFactory::new(ContextPolicy::Shared);
/// let mut connection = factory.create_connection(&ConnectionSpec::default()).await?;
///
/// let mut interaction = connection.create_interaction()?;
/// let input = factory
///     .record_factory()
///     .create_input()
///     .with("filename", "data/grid.rdf")
///     .with("query", "SELECT sup.sup.sup.sup.mRID FROM EnergyConsumer");
///
/// let mut rows = interaction
///     .execute(&InteractionSpec::get_data_frame(), &input)
///     .await?
///     .into_result_set()?;
///
/// while rows.next().await? {
///     println!("{:?}", rows.get_string(1)?);
/// }
///
/// rows.close();
/// interaction.close();
/// connection.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    registry: Arc<ContextRegistry>,
    policy: ContextPolicy,
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self::new(ContextPolicy::default())
    }
}

impl ConnectionFactory {
    /// Factory with its own registry
    pub fn new(policy: ContextPolicy) -> Self {
        Self::with_registry(Arc::new(ContextRegistry::new()), policy)
    }

    pub fn with_registry(registry: Arc<ContextRegistry>, policy: ContextPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> ContextPolicy {
        self.policy
    }

    #[instrument(skip_all, fields(user = %spec.effective_user_name()), err)]
    pub async fn create_connection(&self, spec: &ConnectionSpec) -> Result<Connection> {
        let backend = self.registry.acquire(spec, self.policy).await?;
        let connection = Connection::new(backend, spec.effective_user_name().to_string());

        info!(connection_id = %connection.id(), "Connection created");
        Ok(connection)
    }

    pub fn record_factory(&self) -> RecordFactory {
        RecordFactory
    }
}
