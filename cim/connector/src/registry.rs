//! Shared backend contexts keyed by configuration fingerprint.

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::backend::BackendContext;
use crate::spec::ConnectionSpec;
use crate::Result;

/// Normalized identity of a configuration
///
/// Two configurations with the same properties and the same set of artifacts share a fingerprint,
/// regardless of property order, artifact order, duplicate artifacts or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    properties: BTreeMap<String, String>,
    artifacts: Vec<String>,
}

impl Fingerprint {
    pub fn new(spec: &ConnectionSpec) -> Self {
        let mut artifacts = spec.artifacts.clone();
        artifacts.sort();
        artifacts.dedup();

        Self {
            properties: spec
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            artifacts,
        }
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        write!(f, "{:016x}", hasher.finish())
    }
}

/// Whether connections share backend contexts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextPolicy {
    /// Reuse a live context created from an equivalent configuration
    #[default]
    Shared,
    /// Every connection gets its own context
    Fresh,
}

/// Lifecycle counters of the contexts and handles created through a registry
#[derive(Debug, Default)]
pub struct RegistryStats {
    initializations: AtomicUsize,
    teardowns: AtomicUsize,
    open_connections: AtomicUsize,
    open_interactions: AtomicUsize,
    open_cursors: AtomicUsize,
}

impl RegistryStats {
    /// Backend contexts created
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Backend contexts torn down after their last lease was released
    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Backend contexts currently alive
    pub fn live_contexts(&self) -> usize {
        self.initializations()
            .saturating_sub(self.teardowns())
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub fn open_interactions(&self) -> usize {
        self.open_interactions.load(Ordering::SeqCst)
    }

    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub(crate) fn record_initialization(&self) {
        self.initializations.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }

    fn handles(&self, kind: HandleKind) -> &AtomicUsize {
        match kind {
            HandleKind::Connection => &self.open_connections,
            HandleKind::Interaction => &self.open_interactions,
            HandleKind::Cursor => &self.open_cursors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleKind {
    Connection,
    Interaction,
    Cursor,
}

/// A counted lease on a backend context, held by connections, interactions and cursors
///
/// The context is torn down once the last lease is dropped.
#[derive(Debug)]
pub(crate) struct Lease {
    backend: Arc<BackendContext>,
    kind: HandleKind,
}

impl Lease {
    pub(crate) fn new(backend: Arc<BackendContext>, kind: HandleKind) -> Self {
        backend.stats().handles(kind).fetch_add(1, Ordering::SeqCst);
        Self { backend, kind }
    }

    pub(crate) fn backend(&self) -> &Arc<BackendContext> {
        &self.backend
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.backend
            .stats()
            .handles(self.kind)
            .fetch_sub(1, Ordering::SeqCst);
    }
}

// Per-fingerprint slot; its lock is held while the context is being created
type Slot = Arc<Mutex<Weak<BackendContext>>>;

/// Registry of live backend contexts
///
/// Only weak references are kept: a context lives as long as some connection, interaction or
/// cursor holds a lease on it. Creation is serialized per fingerprint, so concurrent requests for
/// the same fingerprint start a single context while other fingerprints proceed independently.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: Mutex<HashMap<Fingerprint, Slot>>,
    stats: Arc<RegistryStats>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &Arc<RegistryStats> {
        &self.stats
    }

    /// Number of shared contexts currently alive
    pub async fn shared_contexts(&self) -> usize {
        self.contexts
            .lock()
            .await
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|context| context.strong_count() > 0)
                    .unwrap_or(false)
            })
            .count()
    }

    #[instrument(skip_all, fields(policy = ?policy), err)]
    pub(crate) async fn acquire(
        &self,
        spec: &ConnectionSpec,
        policy: ContextPolicy,
    ) -> Result<Arc<BackendContext>> {
        let fingerprint = Fingerprint::new(spec);

        if policy == ContextPolicy::Fresh {
            let backend = BackendContext::initialize(fingerprint, spec, self.stats.clone()).await?;
            return Ok(Arc::new(backend));
        }

        let slot = self.slot(&fingerprint).await;
        let mut context = slot.lock().await;

        if let Some(backend) = context.upgrade() {
            debug!(fingerprint = %fingerprint, "Reusing backend context");
            return Ok(backend);
        }

        let backend = Arc::new(
            BackendContext::initialize(fingerprint, spec, self.stats.clone()).await?,
        );
        *context = Arc::downgrade(&backend);

        Ok(backend)
    }

    // slot for a fingerprint; idle slots of torn down contexts are dropped
    async fn slot(&self, fingerprint: &Fingerprint) -> Slot {
        let mut contexts = self.contexts.lock().await;
        contexts.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || slot
                    .try_lock()
                    .map(|context| context.strong_count() > 0)
                    .unwrap_or(true)
        });

        Arc::clone(contexts.entry(fingerprint.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(properties: &[(&str, &str)], artifacts: &[&str]) -> ConnectionSpec {
        ConnectionSpec::builder()
            .properties(
                properties
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
            .artifacts(artifacts.iter().map(|a| a.to_string()).collect())
            .build()
    }

    #[test]
    fn test_fingerprint_is_normalized() {
        let a = spec(&[("a", "1"), ("b", "2")], &["y.yml", "x.yml", "x.yml"]);
        let mut b = spec(&[("b", "2"), ("a", "1")], &["x.yml", "y.yml"]);
        b.user_name = Some("someone".to_string());
        b.password = Some("secret".to_string());

        assert_eq!(Fingerprint::new(&a), Fingerprint::new(&b));
        assert_eq!(Fingerprint::new(&a).to_string(), Fingerprint::new(&b).to_string());
        assert_eq!(Fingerprint::new(&a).artifacts(), ["x.yml", "y.yml"]);
    }

    #[test]
    fn test_fingerprint_differs_on_properties() {
        let a = spec(&[("datafusion.execution.batch_size", "1024")], &[]);
        let b = spec(&[("datafusion.execution.batch_size", "2048")], &[]);

        assert_ne!(Fingerprint::new(&a), Fingerprint::new(&b));
    }

    #[tokio::test]
    async fn test_shared_policy_reuses_context() {
        let registry = ContextRegistry::new();
        let spec = ConnectionSpec::default();

        let first = registry.acquire(&spec, ContextPolicy::Shared).await.unwrap();
        let second = registry.acquire(&spec, ContextPolicy::Shared).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.stats().initializations(), 1);
        assert_eq!(registry.shared_contexts().await, 1);
    }

    #[tokio::test]
    async fn test_fresh_policy_creates_contexts() {
        let registry = ContextRegistry::new();
        let spec = ConnectionSpec::default();

        let first = registry.acquire(&spec, ContextPolicy::Fresh).await.unwrap();
        let second = registry.acquire(&spec, ContextPolicy::Fresh).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.stats().initializations(), 2);
        assert_eq!(registry.shared_contexts().await, 0);
    }

    #[tokio::test]
    async fn test_context_torn_down_with_last_lease() {
        let registry = ContextRegistry::new();
        let spec = ConnectionSpec::default();

        let backend = registry.acquire(&spec, ContextPolicy::Shared).await.unwrap();
        let lease = Lease::new(backend, HandleKind::Connection);
        assert_eq!(registry.stats().open_connections(), 1);

        drop(lease);
        assert_eq!(registry.stats().open_connections(), 0);
        assert_eq!(registry.stats().teardowns(), 1);
        assert_eq!(registry.shared_contexts().await, 0);

        registry.acquire(&spec, ContextPolicy::Shared).await.unwrap();
        assert_eq!(registry.stats().initializations(), 2);
    }

    #[tokio::test]
    async fn test_slow_creation_does_not_block_other_fingerprints() {
        let registry = ContextRegistry::new();
        let busy = spec(&[("datafusion.execution.batch_size", "64")], &[]);

        let slot = registry.slot(&Fingerprint::new(&busy)).await;
        let _creating = slot.lock().await;

        let other = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            registry.acquire(&ConnectionSpec::default(), ContextPolicy::Shared),
        )
        .await
        .expect("acquire blocked by another fingerprint")
        .unwrap();

        assert_eq!(other.fingerprint(), &Fingerprint::new(&ConnectionSpec::default()));
        assert_eq!(registry.stats().initializations(), 1);
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_slot_reusable() {
        let registry = ContextRegistry::new();
        let invalid = spec(&[("datafusion.execution.batch_size", "many")], &[]);

        assert!(registry.acquire(&invalid, ContextPolicy::Shared).await.is_err());
        assert_eq!(registry.shared_contexts().await, 0);

        registry
            .acquire(&ConnectionSpec::default(), ContextPolicy::Shared)
            .await
            .unwrap();
        assert_eq!(registry.stats().initializations(), 1);
    }
}
