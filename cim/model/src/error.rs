use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed RDF/XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Element '{class}' at byte {position} has neither rdf:ID nor rdf:about")]
    MissingIdentifier { class: String, position: u64 },

    #[error("Class '{0}' is defined more than once")]
    DuplicateClass(String),

    #[error("Class '{class}' extends unknown class '{superclass}'")]
    UnknownSuperclass { class: String, superclass: String },

    #[error("Class '{0}' does not descend from Element")]
    DetachedClass(String),

    #[error("Class '{class}' declares field '{field}' more than once")]
    DuplicateField { class: String, field: String },

    #[error("Unsupported class artifact format: '{0}'")]
    UnknownArtifactFormat(String),

    #[error("Invalid class artifact: {0}")]
    Artifact(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] datafusion::arrow::error::ArrowError),
}
