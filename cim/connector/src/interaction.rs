//! Interactions: named operations executed against a connection's backend.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use cim_storage::Location;
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::prelude::DataFrame;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::{BackendContext, LoadedFile};
use crate::record::{MappedRecord, Record, Value};
use crate::registry::{HandleKind, Lease};
use crate::result_set::ResultSet;
use crate::{Error, Result};

/// Loads a file and reports its element count
pub const READ_FUNCTION: &str = "read";

/// Runs a query against the tables of a file and returns a [`ResultSet`]
pub const GET_DATAFRAME_FUNCTION: &str = "getDataFrame";

/// Returns the logical and physical plans of a query
pub const EXPLAIN_FUNCTION: &str = "explain";

pub const FILENAME_KEY: &str = "filename";
pub const QUERY_KEY: &str = "query";
pub const RELOAD_KEY: &str = "reload";
pub const COUNT_KEY: &str = "count";
pub const CLASSES_KEY: &str = "classes";
pub const PLAN_KEY: &str = "plan";

/// The operations an interaction can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Read,
    GetDataFrame,
    Explain,
}

impl FromStr for Function {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            READ_FUNCTION => Ok(Function::Read),
            GET_DATAFRAME_FUNCTION => Ok(Function::GetDataFrame),
            EXPLAIN_FUNCTION => Ok(Function::Explain),
            other => Err(Error::UnsupportedFunction(other.to_string())),
        }
    }
}

/// Names the function an interaction executes; stateless and reusable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionSpec {
    function_name: String,
}

impl InteractionSpec {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }

    pub fn read() -> Self {
        Self::new(READ_FUNCTION)
    }

    pub fn get_data_frame() -> Self {
        Self::new(GET_DATAFRAME_FUNCTION)
    }

    pub fn explain() -> Self {
        Self::new(EXPLAIN_FUNCTION)
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function(&self) -> Result<Function> {
        self.function_name.parse()
    }
}

/// Lifecycle state of an [`Interaction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Ready,
    Executing,
    Closed,
}

impl std::fmt::Display for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionState::Ready => write!(f, "ready"),
            InteractionState::Executing => write!(f, "executing"),
            InteractionState::Closed => write!(f, "closed"),
        }
    }
}

/// Executes functions against the backend context of the connection that created it
///
/// Each call to [`Interaction::execute`] moves the interaction from `Ready` to `Executing` and
/// back, whatever the outcome. An execution whose future is dropped before completion leaves the
/// interaction `Executing`, after which it only accepts [`Interaction::close`].
pub struct Interaction {
    id: Uuid,
    connection_id: Uuid,
    state: InteractionState,
    lease: Option<Lease>,
    plans: HashMap<(Url, String), DataFrame>,
}

impl std::fmt::Debug for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("state", &self.state)
            .field("cached_plans", &self.plans.len())
            .finish()
    }
}

impl Interaction {
    pub(crate) fn new(connection_id: Uuid, backend: Arc<BackendContext>) -> Self {
        let id = Uuid::new_v4();
        debug!(interaction_id = %id, connection_id = %connection_id, "Interaction created");

        Self {
            id,
            connection_id,
            state: InteractionState::Ready,
            lease: Some(Lease::new(backend, HandleKind::Interaction)),
            plans: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the connection that created this interaction
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Execute a function, returning either a mapped record or a result set
    #[instrument(skip_all, fields(interaction_id = %self.id, function = %spec.function_name()), err)]
    pub async fn execute(&mut self, spec: &InteractionSpec, input: &MappedRecord) -> Result<Record> {
        let backend = self.begin()?;
        let result = self.dispatch(&backend, spec, input).await;
        self.state = InteractionState::Ready;

        result
    }

    /// Execute a function and copy its output into `output`
    ///
    /// Only functions producing a mapped record are accepted here; `getDataFrame` fails with an
    /// unsupported result type error.
    #[instrument(skip_all, fields(interaction_id = %self.id, function = %spec.function_name()), err)]
    pub async fn execute_into(
        &mut self,
        spec: &InteractionSpec,
        input: &MappedRecord,
        output: &mut MappedRecord,
    ) -> Result<bool> {
        let backend = self.begin()?;

        let result = match spec.function() {
            Ok(Function::GetDataFrame) => Err(Error::UnsupportedResultType(format!(
                "'{GET_DATAFRAME_FUNCTION}' produces a result set, use execute"
            ))),
            Ok(_) => self.dispatch(&backend, spec, input).await,
            Err(e) => Err(e),
        };
        self.state = InteractionState::Ready;

        output.merge(result?.into_mapped()?);
        Ok(true)
    }

    /// Drop cached plans and release the backend lease
    pub fn close(&mut self) {
        if self.state == InteractionState::Closed {
            return;
        }

        debug!(interaction_id = %self.id, "Closing interaction");
        self.plans.clear();
        self.lease = None;
        self.state = InteractionState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == InteractionState::Closed
    }

    fn begin(&mut self) -> Result<Arc<BackendContext>> {
        if self.state != InteractionState::Ready {
            return Err(Error::InteractionState(self.state.to_string()));
        }

        let backend = self
            .lease
            .as_ref()
            .map(|lease| Arc::clone(lease.backend()))
            .ok_or_else(|| Error::InteractionState(InteractionState::Closed.to_string()))?;

        self.state = InteractionState::Executing;
        Ok(backend)
    }

    async fn dispatch(
        &mut self,
        backend: &Arc<BackendContext>,
        spec: &InteractionSpec,
        input: &MappedRecord,
    ) -> Result<Record> {
        match spec.function()? {
            Function::Read => self.read(backend, input).await.map(Record::Mapped),
            Function::GetDataFrame => self
                .get_data_frame(backend, input)
                .await
                .map(Record::ResultSet),
            Function::Explain => self.explain(backend, input).await.map(Record::Mapped),
        }
    }

    async fn read(&mut self, backend: &BackendContext, input: &MappedRecord) -> Result<MappedRecord> {
        let location = Location::try_from(input.require_str(FILENAME_KEY)?)?;
        let reload = input.optional_bool(RELOAD_KEY)?.unwrap_or(false);

        if reload {
            self.plans.retain(|(url, _), _| url != &location.0);
        }

        let loaded = backend.load(&location, reload).await?;
        let classes = loaded
            .class_counts()
            .iter()
            .map(|(class, count)| (class.clone(), Value::from(*count)))
            .collect::<BTreeMap<_, _>>();

        Ok(MappedRecord::new(MappedRecord::OUTPUT)
            .with(COUNT_KEY, loaded.element_count())
            .with(CLASSES_KEY, classes))
    }

    async fn get_data_frame(
        &mut self,
        backend: &Arc<BackendContext>,
        input: &MappedRecord,
    ) -> Result<ResultSet> {
        let df = self.plan(backend, input).await?;
        let stream = df
            .execute_stream()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        ResultSet::open(stream, Lease::new(Arc::clone(backend), HandleKind::Cursor)).await
    }

    async fn explain(&mut self, backend: &BackendContext, input: &MappedRecord) -> Result<MappedRecord> {
        let batches = self
            .plan(backend, input)
            .await?
            .explain(false, false)?
            .collect()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut plans = BTreeMap::new();
        for batch in &batches {
            let (plan_type, plan) = (batch.column(0), batch.column(1));
            for row in 0..batch.num_rows() {
                plans.insert(
                    array_value_to_string(plan_type, row)?,
                    Value::String(array_value_to_string(plan, row)?),
                );
            }
        }

        Ok(MappedRecord::new(MappedRecord::OUTPUT).with(PLAN_KEY, plans))
    }

    // plans are cached per file and query for the lifetime of the interaction
    async fn plan(&mut self, backend: &BackendContext, input: &MappedRecord) -> Result<DataFrame> {
        let location = Location::try_from(input.require_str(FILENAME_KEY)?)?;
        let query = input.require_str(QUERY_KEY)?;

        let key = (location.0.clone(), query.to_string());
        if let Some(df) = self.plans.get(&key) {
            debug!("Using cached plan");
            return Ok(df.clone());
        }

        let loaded: Arc<LoadedFile> = backend.load(&location, false).await?;
        let df = loaded.plan(query).await?;
        self.plans.insert(key, df.clone());

        Ok(df)
    }
}

impl Drop for Interaction {
    fn drop(&mut self) {
        if self.state != InteractionState::Closed {
            warn!(interaction_id = %self.id, "Interaction dropped without close, releasing lease");
        }
    }
}
