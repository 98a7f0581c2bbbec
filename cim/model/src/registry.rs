use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Field, Fields, Schema, SchemaRef};
use tracing::debug;

use crate::builtin::builtin_classes;
use crate::class::{ClassDef, ROOT_CLASS, SUP_FIELD};
use crate::{Error, Result};

/// The set of CIM classes a backend knows how to read
///
/// Starts from the built-in hierarchy and can be extended with classes from artifacts.
/// Every class chain is validated to end at [`ROOT_CLASS`].
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: BTreeMap<String, ClassDef>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassRegistry {
    /// Registry containing only the built-in classes
    pub fn builtin() -> Self {
        let classes = builtin_classes()
            .into_iter()
            .map(|class| (class.name.clone(), class))
            .collect();

        Self { classes }
    }

    /// Add classes to the registry
    /// Nothing is added unless every class is valid against the combined hierarchy
    pub fn extend(&mut self, classes: Vec<ClassDef>) -> Result<()> {
        let mut candidate = self.classes.clone();

        for class in classes {
            if candidate.contains_key(&class.name) {
                return Err(Error::DuplicateClass(class.name));
            }

            if let Some(field) = duplicate_field(&class) {
                return Err(Error::DuplicateField {
                    class: class.name.clone(),
                    field: field.to_string(),
                });
            }

            debug!(class = %class.name, superclass = ?class.superclass, "Adding class");
            candidate.insert(class.name.clone(), class);
        }

        validate(&candidate)?;
        self.classes = candidate;

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// All class definitions ordered by name
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    /// The class followed by all of its superclasses, ending with the root
    /// Empty for an unknown class
    pub fn lineage(&self, name: &str) -> Vec<&ClassDef> {
        let mut lineage = vec![];
        let mut current = self.classes.get(name);

        while let Some(class) = current {
            lineage.push(class);
            current = class
                .superclass
                .as_deref()
                .and_then(|superclass| self.classes.get(superclass));
        }

        lineage
    }

    /// Whether `class` is `ancestor` or one of its subclasses
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        self.lineage(class).iter().any(|c| c.name == ancestor)
    }

    /// Arrow fields of the view of a class: `sup` first (except for the root), then own fields
    pub fn view_fields(&self, name: &str) -> Option<Fields> {
        let class = self.classes.get(name)?;
        let mut fields: Vec<Field> = Vec::with_capacity(class.fields.len() + 1);

        if let Some(superclass) = class.superclass.as_deref() {
            let sup = self.view_fields(superclass)?;
            fields.push(Field::new(SUP_FIELD, DataType::Struct(sup), false));
        }

        fields.extend(
            class
                .fields
                .iter()
                .map(|field| Field::new(field.name.as_str(), field.kind.data_type(), true)),
        );

        Some(Fields::from(fields))
    }

    /// Table schema for a class
    pub fn schema(&self, name: &str) -> Option<SchemaRef> {
        self.view_fields(name)
            .map(|fields| Arc::new(Schema::new(fields)))
    }
}

// `sup` is taken by the superclass column
fn duplicate_field(class: &ClassDef) -> Option<&str> {
    let mut seen = HashSet::from([SUP_FIELD]);
    class
        .fields
        .iter()
        .map(|field| field.name.as_str())
        .find(|name| !seen.insert(*name))
}

fn validate(classes: &BTreeMap<String, ClassDef>) -> Result<()> {
    for class in classes.values() {
        let mut visited = HashSet::new();
        let mut current = class;

        loop {
            if !visited.insert(current.name.as_str()) {
                return Err(Error::DetachedClass(class.name.clone()));
            }

            match current.superclass.as_deref() {
                None if current.name == ROOT_CLASS => break,
                None => return Err(Error::DetachedClass(current.name.clone())),
                Some(superclass) => {
                    current = classes.get(superclass).ok_or_else(|| Error::UnknownSuperclass {
                        class: current.name.clone(),
                        superclass: superclass.to_string(),
                    })?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{FieldDef, FieldKind, ID_FIELD};

    fn class(name: &str, superclass: &str) -> ClassDef {
        ClassDef {
            name: name.to_string(),
            superclass: Some(superclass.to_string()),
            fields: vec![],
        }
    }

    #[test]
    fn test_builtin_hierarchy_is_valid() {
        let registry = ClassRegistry::builtin();
        validate(&registry.classes).unwrap();
        assert!(registry.len() > 30);
    }

    #[test]
    fn test_energy_consumer_lineage() {
        let registry = ClassRegistry::builtin();
        let names = registry
            .lineage("EnergyConsumer")
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            vec![
                "EnergyConsumer",
                "ConductingEquipment",
                "Equipment",
                "PowerSystemResource",
                "IdentifiedObject",
                "Element"
            ]
        );
        assert!(registry.is_a("Breaker", "Switch"));
        assert!(!registry.is_a("Switch", "Breaker"));
        assert!(registry.lineage("NoSuchClass").is_empty());
    }

    #[test]
    fn test_view_fields_nest_superclasses() {
        let registry = ClassRegistry::builtin();
        let schema = registry.schema("EnergyConsumer").unwrap();

        assert_eq!(schema.field(0).name(), SUP_FIELD);
        assert!(schema.field_with_name("customerCount").is_ok());

        let mut data_type = schema.field(0).data_type().clone();
        for _ in 0..3 {
            let DataType::Struct(fields) = data_type else {
                panic!("expected struct")
            };
            data_type = fields.find(SUP_FIELD).unwrap().1.data_type().clone();
        }

        // EnergyConsumer.sup.sup.sup.sup is the IdentifiedObject view
        let DataType::Struct(identified_object) = data_type else {
            panic!("expected struct")
        };
        assert!(identified_object.find("mRID").is_some());
        assert!(identified_object.find(SUP_FIELD).is_some());
    }

    #[test]
    fn test_root_view_has_only_id() {
        let registry = ClassRegistry::builtin();
        let fields = registry.view_fields(ROOT_CLASS).unwrap();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name(), ID_FIELD);
    }

    #[test]
    fn test_extend_with_new_class() {
        let mut registry = ClassRegistry::builtin();
        let mut customer = class("Customer", "IdentifiedObject");
        customer.fields.push(FieldDef::new("kind", FieldKind::String));

        registry.extend(vec![customer]).unwrap();

        assert!(registry.is_a("Customer", "IdentifiedObject"));
        assert!(registry.schema("Customer").unwrap().field_with_name("kind").is_ok());
    }

    #[test]
    fn test_extend_rejects_duplicate_class() {
        let mut registry = ClassRegistry::builtin();
        let result = registry.extend(vec![class("Breaker", "Switch")]);

        assert!(matches!(result, Err(Error::DuplicateClass(name)) if name == "Breaker"));
    }

    #[test]
    fn test_extend_rejects_unknown_superclass() {
        let mut registry = ClassRegistry::builtin();
        let before = registry.len();
        let result = registry.extend(vec![
            class("Meter", "EndDevice"),
            class("Customer", "IdentifiedObject"),
        ]);

        assert!(matches!(result, Err(Error::UnknownSuperclass { .. })));
        assert_eq!(registry.len(), before);
        assert!(!registry.contains("Customer"));
    }

    #[test]
    fn test_extend_rejects_cycles() {
        let mut registry = ClassRegistry::builtin();
        let result = registry.extend(vec![class("A", "B"), class("B", "A")]);

        assert!(matches!(result, Err(Error::DetachedClass(_))));
    }

    #[test]
    fn test_extend_rejects_second_root() {
        let mut registry = ClassRegistry::builtin();
        let result = registry.extend(vec![ClassDef {
            name: "Orphan".to_string(),
            superclass: None,
            fields: vec![],
        }]);

        assert!(matches!(result, Err(Error::DetachedClass(name)) if name == "Orphan"));
    }

    #[test]
    fn test_extend_rejects_duplicate_field() {
        let mut registry = ClassRegistry::builtin();
        let mut meter = class("Meter", "IdentifiedObject");
        meter.fields = vec![
            FieldDef::new("serial", FieldKind::String),
            FieldDef::new("serial", FieldKind::Integer),
        ];

        let result = registry.extend(vec![meter]);
        assert!(matches!(result, Err(Error::DuplicateField { .. })));
    }

    #[test]
    fn test_extend_rejects_sup_field() {
        let mut registry = ClassRegistry::builtin();
        let mut meter = class("Meter", "IdentifiedObject");
        meter.fields = vec![FieldDef::new(SUP_FIELD, FieldKind::String)];

        let result = registry.extend(vec![meter]);
        assert!(matches!(result, Err(Error::DuplicateField { field, .. }) if field == "sup"));
        assert!(!registry.contains("Meter"));
    }

    #[test]
    fn test_extend_accepts_subclass_before_superclass() {
        let mut registry = ClassRegistry::builtin();

        registry
            .extend(vec![
                class("SmartMeter", "Meter"),
                class("Meter", "IdentifiedObject"),
            ])
            .unwrap();

        assert!(registry.is_a("SmartMeter", "IdentifiedObject"));
    }
}
