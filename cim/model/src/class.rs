//! Class and field definitions of the CIM model.

use datafusion::arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

/// Name of the root class every CIM class descends from
pub const ROOT_CLASS: &str = "Element";

/// Name of the field linking a class view to its superclass view
pub const SUP_FIELD: &str = "sup";

/// Name of the root field holding the element identifier
pub const ID_FIELD: &str = "id";

/// Value type of a CIM attribute or association end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Double,
    Integer,
    Boolean,
    /// Association to another element, stored as the referenced element id
    Reference,
}

impl FieldKind {
    pub fn data_type(&self) -> DataType {
        match self {
            FieldKind::String | FieldKind::Reference => DataType::Utf8,
            FieldKind::Double => DataType::Float64,
            FieldKind::Integer => DataType::Int64,
            FieldKind::Boolean => DataType::Boolean,
        }
    }
}

/// A field declared by a CIM class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name, the part after the dot in `Class.field` property tags
    pub name: String,

    pub kind: FieldKind,

    /// When set the field falls back to the element id if the file does not provide it
    #[serde(default)]
    pub identifier: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            identifier: false,
        }
    }
}

/// A CIM class with its direct superclass and the fields it declares itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,

    /// Direct superclass, `None` only for the root class
    #[serde(default)]
    pub superclass: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ClassDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}
