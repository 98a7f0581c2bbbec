//! Rendering parsed elements as one Arrow table per CIM class.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use datafusion::arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray, StructArray,
};
use datafusion::arrow::datatypes::{DataType, Field, Fields, Schema};
use tracing::{debug, warn};

use crate::class::{ClassDef, FieldDef, FieldKind, ID_FIELD, ROOT_CLASS, SUP_FIELD};
use crate::parser::{parse_rdf, ParsedElement};
use crate::registry::ClassRegistry;
use crate::{Error, Result};

/// The elements of one CIM file
#[derive(Debug, Clone, Default)]
pub struct CimModel {
    elements: Vec<ParsedElement>,
}

/// A class table ready to be registered with the engine
#[derive(Debug, Clone)]
pub struct ClassTable {
    pub name: String,
    pub batch: RecordBatch,
}

impl CimModel {
    pub fn new(elements: Vec<ParsedElement>) -> Self {
        Self { elements }
    }

    /// Parse an RDF/XML document
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        parse_rdf(bytes).map(Self::new)
    }

    pub fn elements(&self) -> &[ParsedElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of elements per class as written in the file, unknown classes included
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for element in &self.elements {
            *counts.entry(element.class.clone()).or_default() += 1;
        }

        counts
    }

    /// One table per registered class, including classes without instances
    pub fn tables(&self, registry: &ClassRegistry) -> Result<Vec<ClassTable>> {
        let mut members: HashMap<&str, Vec<&ParsedElement>> = HashMap::new();

        for element in &self.elements {
            let lineage = registry.lineage(&element.class);
            if lineage.is_empty() {
                members.entry(ROOT_CLASS).or_default().push(element);
            }

            for class in lineage {
                members.entry(class.name.as_str()).or_default().push(element);
            }
        }

        registry
            .classes()
            .map(|class| {
                let rows = members.get(class.name.as_str()).map(Vec::as_slice).unwrap_or_default();
                let (fields, columns) = view_columns(registry, class, rows)?;
                let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;

                debug!(class = %class.name, rows = batch.num_rows(), "Built class table");
                Ok(ClassTable {
                    name: class.name.clone(),
                    batch,
                })
            })
            .collect()
    }
}

fn view_columns(
    registry: &ClassRegistry,
    class: &ClassDef,
    rows: &[&ParsedElement],
) -> Result<(Fields, Vec<ArrayRef>)> {
    let mut fields = Vec::with_capacity(class.fields.len() + 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(class.fields.len() + 1);

    if let Some(superclass) = class.superclass.as_deref() {
        let sup = registry
            .get(superclass)
            .ok_or_else(|| Error::UnknownSuperclass {
                class: class.name.clone(),
                superclass: superclass.to_string(),
            })?;

        let (sup_fields, sup_columns) = view_columns(registry, sup, rows)?;
        let array = StructArray::try_new(sup_fields.clone(), sup_columns, None)?;

        fields.push(Field::new(SUP_FIELD, DataType::Struct(sup_fields), false));
        columns.push(Arc::new(array));
    }

    for field in &class.fields {
        fields.push(Field::new(field.name.as_str(), field.kind.data_type(), true));
        columns.push(field_column(class, field, rows));
    }

    Ok((Fields::from(fields), columns))
}

fn field_column(class: &ClassDef, field: &FieldDef, rows: &[&ParsedElement]) -> ArrayRef {
    let key = format!("{}.{}", class.name, field.name);
    let is_id = class.name == ROOT_CLASS && field.name == ID_FIELD;

    let values = rows.iter().map(|row| {
        if is_id {
            return Some(row.id.as_str());
        }

        row.property(&key)
            .or_else(|| field.identifier.then_some(row.id.as_str()))
    });

    match field.kind {
        FieldKind::String | FieldKind::Reference => Arc::new(values.collect::<StringArray>()),
        FieldKind::Double => {
            let parsed = typed(&key, values, |raw| raw.trim().parse::<f64>().ok());
            Arc::new(Float64Array::from(parsed))
        }
        FieldKind::Integer => Arc::new(Int64Array::from(typed(&key, values, parse_integer))),
        FieldKind::Boolean => Arc::new(BooleanArray::from(typed(&key, values, parse_boolean))),
    }
}

// unparsable values become null, reported once per column
fn typed<'a, T>(
    key: &str,
    values: impl Iterator<Item = Option<&'a str>>,
    parse: impl Fn(&str) -> Option<T>,
) -> Vec<Option<T>> {
    let mut invalid = 0usize;
    let mut example = None;

    let parsed = values
        .map(|value| {
            let raw = value?;
            let parsed = parse(raw);
            if parsed.is_none() {
                invalid += 1;
                example.get_or_insert_with(|| raw.to_string());
            }
            parsed
        })
        .collect();

    if let Some(example) = example {
        warn!(property = %key, invalid, example = %example, "Values do not match the declared type, stored as null");
    }

    parsed
}

fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.fract() == 0.0)
            .map(|value| value as i64)
    })
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
