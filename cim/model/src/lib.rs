//! # CIM model
//!
//! Reads Common Information Model (CIM) RDF/XML exports and renders them as Arrow tables.
//!
//! Every CIM class becomes one table named after the class. Columns are the fields the class
//! declares itself, preceded by a `sup` struct column holding the view of its superclass, so
//! `EnergyConsumer.sup.sup.sup.sup.mRID` reaches the `IdentifiedObject` identifier.
//!
//! ```
//! use cim_model::{CimModel, ClassRegistry};
//!
//! let rdf = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:cim="cim">
//!     <cim:Breaker rdf:ID="BR1"><cim:Switch.normalOpen>false</cim:Switch.normalOpen></cim:Breaker>
//! </rdf:RDF>"#;
//!
//! let model = CimModel::parse(rdf.as_bytes()).unwrap();
//! let tables = model.tables(&ClassRegistry::builtin()).unwrap();
//! let switches = tables.iter().find(|t| t.name == "Switch").unwrap();
//! assert_eq!(switches.batch.num_rows(), 1);
//! ```

pub mod artifact;
pub mod class;
pub mod error;
pub mod parser;

mod builtin;
mod registry;
mod table;

pub use artifact::{ArtifactFormat, ClassArtifact};
pub use class::{ClassDef, FieldDef, FieldKind, ID_FIELD, ROOT_CLASS, SUP_FIELD};
pub use error::Error;
pub use parser::ParsedElement;
pub use registry::ClassRegistry;
pub use table::{ClassTable, CimModel};

pub type Result<T> = core::result::Result<T, error::Error>;
