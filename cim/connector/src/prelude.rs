//! Commonly used types, importable with `use cim_connector::prelude::*;`.

pub use crate::{
    Connection, ConnectionFactory, ConnectionSpec, ContextPolicy, Interaction, InteractionSpec,
    MappedRecord, Record, RecordFactory, ResultSet, Value,
};
pub use crate::{EXPLAIN_FUNCTION, GET_DATAFRAME_FUNCTION, READ_FUNCTION};
