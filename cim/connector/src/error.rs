use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid connection configuration: {0}")]
    Configuration(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Interaction is {0}, expected ready")]
    InteractionState(String),

    #[error("Unsupported interaction function: '{0}'")]
    UnsupportedFunction(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unsupported result type: {0}")]
    UnsupportedResultType(String),

    #[error("Column index {index} is out of range, the result has {count} columns")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Column {index} of type {actual} cannot be read as {requested}")]
    TypeMismatch {
        index: usize,
        actual: String,
        requested: String,
    },

    #[error("Result set is closed")]
    CursorClosed,

    #[error("Result set is not positioned on a row")]
    NoCurrentRow,

    #[error("Missing template parameters: {0:?}")]
    MissingParams(BTreeSet<String>),

    #[error("Configuration file error: {0}")]
    Template(String),

    #[error(transparent)]
    Storage(#[from] cim_storage::Error),

    #[error(transparent)]
    Model(#[from] cim_model::Error),

    #[error(transparent)]
    Arrow(#[from] datafusion::arrow::error::ArrowError),

    #[error(transparent)]
    DataFusion(#[from] datafusion::error::DataFusionError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
