//! # CIM connector
//!
//! Connection-managed access to Common Information Model (CIM) RDF/XML files through DataFusion.
//!
//! A [`ConnectionFactory`] turns a [`ConnectionSpec`] into [`Connection`]s bound to a backend
//! context. Connections create [`Interaction`]s, which execute one of three functions:
//!
//! - `read` loads a file and reports the number of elements it holds
//! - `getDataFrame` runs a SQL query against the class tables of a file and returns a
//!   [`ResultSet`]
//! - `explain` returns the plans of a query
//!
//! Each CIM class is a table named after the class. A table's `sup` column nests the superclass
//! view, so `SELECT s.sup.sup.sup.sup.mRID FROM EnergyConsumer s` reads the `IdentifiedObject`
//! identifier of every energy consumer.
//!
//! Backend contexts are shared between connections with equivalent configurations and torn down
//! when the last connection, interaction or cursor using them is closed.

pub mod error;
pub mod prelude;

mod backend;
mod connection;
mod factory;
mod interaction;
mod record;
mod registry;
mod result_set;
mod spec;

pub use backend::LoadedFile;
pub use connection::{Connection, Metadata, ANONYMOUS_USER, PRODUCT_NAME};
pub use error::Error;
pub use factory::ConnectionFactory;
pub use interaction::{
    Function, Interaction, InteractionSpec, InteractionState, CLASSES_KEY, COUNT_KEY,
    EXPLAIN_FUNCTION, FILENAME_KEY, GET_DATAFRAME_FUNCTION, PLAN_KEY, QUERY_KEY, READ_FUNCTION,
    RELOAD_KEY,
};
pub use record::{MappedRecord, Record, RecordFactory, RecordKind, Value};
pub use registry::{ContextPolicy, ContextRegistry, Fingerprint, RegistryStats};
pub use result_set::ResultSet;
pub use spec::{ConnectionSpec, SpecFormat};

pub type Result<T> = core::result::Result<T, error::Error>;
