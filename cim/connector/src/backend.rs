//! Backend execution context: engine configuration, class registry and loaded files.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cim_model::{ArtifactFormat, CimModel, ClassArtifact, ClassRegistry};
use cim_storage::Location;
use datafusion::datasource::MemTable;
use datafusion::execution::context::SQLOptions;
use datafusion::execution::runtime_env::{RuntimeEnv, RuntimeEnvBuilder};
use datafusion::prelude::{DataFrame, SessionConfig, SessionContext};
use datafusion::sql::TableReference;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::registry::{Fingerprint, RegistryStats};
use crate::spec::ConnectionSpec;
use crate::{Error, Result};

const DATAFUSION_PREFIX: &str = "datafusion.";
const STORAGE_PREFIX: &str = "storage.";
const MEMORY_LIMIT_KEY: &str = "cim.memory_limit";
const IDENT_NORMALIZATION_KEY: &str = "datafusion.sql_parser.enable_ident_normalization";

/// Backend options derived from configuration properties
#[derive(Debug, Clone)]
pub(crate) struct BackendOptions {
    pub(crate) session: SessionConfig,
    pub(crate) memory_limit: Option<usize>,
    pub(crate) storage: HashMap<String, String>,
}

impl BackendOptions {
    pub(crate) fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut engine = HashMap::from([(IDENT_NORMALIZATION_KEY.to_string(), "false".to_string())]);
        let mut storage = HashMap::new();
        let mut memory_limit = None;

        for (key, value) in properties {
            if key.starts_with(DATAFUSION_PREFIX) {
                engine.insert(key.clone(), value.clone());
            } else if let Some(option) = key.strip_prefix(STORAGE_PREFIX) {
                storage.insert(option.to_string(), value.clone());
            } else if key == MEMORY_LIMIT_KEY {
                memory_limit = Some(parse_memory_size(value)?);
            } else {
                warn!(property = %key, "Ignoring unknown connection property");
            }
        }

        let session = SessionConfig::from_string_hash_map(&engine)
            .map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self {
            session,
            memory_limit,
            storage,
        })
    }
}

/// Parse sizes like `512m`, `4g`, `2GB` or plain bytes
pub(crate) fn parse_memory_size(raw: &str) -> Result<usize> {
    let normalized = raw.trim().to_ascii_lowercase();
    let normalized = normalized.strip_suffix('b').unwrap_or(&normalized);

    let (number, multiplier) = match normalized.char_indices().last() {
        Some((i, 'k')) => (&normalized[..i], 1usize << 10),
        Some((i, 'm')) => (&normalized[..i], 1 << 20),
        Some((i, 'g')) => (&normalized[..i], 1 << 30),
        Some((i, 't')) => (&normalized[..i], 1 << 40),
        _ => (normalized, 1),
    };

    number
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .filter(|bytes| *bytes > 0)
        .ok_or_else(|| Error::Configuration(format!("invalid {MEMORY_LIMIT_KEY} '{raw}'")))
}

/// The tables of one loaded CIM file
pub struct LoadedFile {
    location: Url,
    element_count: usize,
    class_counts: BTreeMap<String, usize>,
    ctx: SessionContext,
}

impl std::fmt::Debug for LoadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFile")
            .field("location", &self.location.as_str())
            .field("element_count", &self.element_count)
            .finish_non_exhaustive()
    }
}

impl LoadedFile {
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Number of elements in the file
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Elements per class name as written in the file
    pub fn class_counts(&self) -> &BTreeMap<String, usize> {
        &self.class_counts
    }

    /// Plan a read-only query against the tables of this file
    /// Does not allow for ddl/dml queries or SQL statements (e.g. SET VARIABLE, CREATE TABLE, etc.)
    pub(crate) async fn plan(&self, query: &str) -> Result<DataFrame> {
        let options = SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false);

        self.ctx
            .sql_with_options(query, options)
            .await
            .map_err(|e| Error::Query(e.to_string()))
    }
}

/// An engine context shared by all connections with the same fingerprint
///
/// Files are parsed once per context and kept until the context is torn down.
pub struct BackendContext {
    fingerprint: Fingerprint,
    session: SessionConfig,
    runtime: Arc<RuntimeEnv>,
    classes: Arc<ClassRegistry>,
    storage: HashMap<String, String>,
    files: Mutex<HashMap<Url, Arc<LoadedFile>>>,
    stats: Arc<RegistryStats>,
}

impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("fingerprint", &self.fingerprint.to_string())
            .field("classes", &self.classes.len())
            .finish_non_exhaustive()
    }
}

impl BackendContext {
    #[instrument(skip_all, fields(fingerprint = %fingerprint), err)]
    pub(crate) async fn initialize(
        fingerprint: Fingerprint,
        spec: &ConnectionSpec,
        stats: Arc<RegistryStats>,
    ) -> Result<Self> {
        let options = BackendOptions::from_properties(&spec.properties)?;

        let mut runtime = RuntimeEnvBuilder::new();
        if let Some(limit) = options.memory_limit {
            info!(memory_bytes = limit, "Creating runtime environment with memory limit");
            runtime = runtime.with_memory_limit(limit, 0.95);
        }
        let runtime = runtime
            .build_arc()
            .map_err(|e| Error::Configuration(format!("failed to build runtime environment: {e}")))?;

        // artifacts may extend each other's classes in any order, so they are validated together
        let mut definitions = vec![];
        for artifact in fingerprint.artifacts() {
            let loaded = load_artifact(artifact, &options.storage)
                .await
                .map_err(|e| Error::Configuration(format!("artifact '{artifact}': {e}")))?;
            definitions.extend(loaded.classes);
        }

        let mut classes = ClassRegistry::builtin();
        classes.extend(definitions).map_err(|e| {
            Error::Configuration(format!("artifacts {:?}: {e}", fingerprint.artifacts()))
        })?;

        stats.record_initialization();
        info!(classes = classes.len(), "Backend context initialized");

        Ok(Self {
            fingerprint,
            session: options.session,
            runtime,
            classes: Arc::new(classes),
            storage: options.storage,
            files: Mutex::new(HashMap::new()),
            stats,
        })
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub(crate) fn stats(&self) -> &Arc<RegistryStats> {
        &self.stats
    }

    /// Load a file into this context, reusing the cached tables unless `reload` is set
    /// A failed load leaves the cache untouched
    #[instrument(skip(self), fields(fingerprint = %self.fingerprint), err)]
    pub(crate) async fn load(&self, location: &Location, reload: bool) -> Result<Arc<LoadedFile>> {
        let mut files = self.files.lock().await;

        if !reload {
            if let Some(loaded) = files.get(&location.0) {
                debug!("Using cached file");
                return Ok(Arc::clone(loaded));
            }
        }

        let bytes = cim_storage::fetch(location, &self.storage).await?;

        let classes = Arc::clone(&self.classes);
        let (element_count, class_counts, tables) = tokio::task::spawn_blocking(move || {
            let model = CimModel::parse(&bytes)?;
            let tables = model.tables(&classes)?;
            Ok::<_, cim_model::Error>((model.len(), model.class_counts(), tables))
        })
        .await??;

        let ctx = SessionContext::new_with_config_rt(self.session.clone(), Arc::clone(&self.runtime));
        for table in tables {
            let provider = MemTable::try_new(table.batch.schema(), vec![vec![table.batch]])?;
            ctx.register_table(TableReference::bare(table.name), Arc::new(provider))?;
        }

        let loaded = Arc::new(LoadedFile {
            location: location.0.clone(),
            element_count,
            class_counts,
            ctx,
        });
        files.insert(location.0.clone(), Arc::clone(&loaded));

        info!(elements = element_count, "Loaded CIM file");
        Ok(loaded)
    }
}

impl Drop for BackendContext {
    fn drop(&mut self) {
        self.stats.record_teardown();
        info!(fingerprint = %self.fingerprint, "Backend context torn down");
    }
}

async fn load_artifact(
    artifact: &str,
    storage: &HashMap<String, String>,
) -> Result<ClassArtifact> {
    let format = ArtifactFormat::from_path(artifact)?;
    let location = Location::try_from(artifact)?;
    let bytes = cim_storage::fetch(&location, storage).await?;

    Ok(ClassArtifact::from_slice(&bytes, format)?)
}
