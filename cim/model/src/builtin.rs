//! Classes known without any artifact: the CIM16 subset found in distribution grid exports.

use crate::class::{ClassDef, FieldDef, FieldKind, ID_FIELD, ROOT_CLASS};

use crate::class::FieldKind::{Boolean as B, Double as D, Integer as I, Reference as R, String as S};

type Builtin = (&'static str, &'static str, &'static [(&'static str, FieldKind)]);

const BUILTIN: &[Builtin] = &[
    (
        "IdentifiedObject",
        ROOT_CLASS,
        &[("aliasName", S), ("description", S), ("mRID", S), ("name", S)],
    ),
    (
        "PowerSystemResource",
        "IdentifiedObject",
        &[("AssetDatasheet", R), ("Location", R), ("PSRType", R)],
    ),
    (
        "Equipment",
        "PowerSystemResource",
        &[("aggregate", B), ("normallyInService", B), ("EquipmentContainer", R)],
    ),
    (
        "ConductingEquipment",
        "Equipment",
        &[("BaseVoltage", R), ("GroundingAction", R), ("JumpingAction", R), ("SvStatus", R)],
    ),
    (
        "EnergyConsumer",
        "ConductingEquipment",
        &[
            ("customerCount", I),
            ("grounded", B),
            ("p", D),
            ("pfixed", D),
            ("pfixedPct", D),
            ("phaseConnection", S),
            ("q", D),
            ("qfixed", D),
            ("qfixedPct", D),
            ("LoadDynamics", R),
            ("LoadResponse", R),
            ("PowerCutZone", R),
        ],
    ),
    ("Conductor", "ConductingEquipment", &[("length", D)]),
    (
        "ACLineSegment",
        "Conductor",
        &[
            ("b0ch", D),
            ("bch", D),
            ("g0ch", D),
            ("gch", D),
            ("r", D),
            ("r0", D),
            ("shortCircuitEndTemperature", D),
            ("x", D),
            ("x0", D),
            ("PerLengthImpedance", R),
        ],
    ),
    (
        "Switch",
        "ConductingEquipment",
        &[
            ("normalOpen", B),
            ("open", B),
            ("ratedCurrent", D),
            ("retained", B),
            ("switchOnCount", I),
        ],
    ),
    ("Fuse", "Switch", &[]),
    ("Disconnector", "Switch", &[]),
    ("ProtectedSwitch", "Switch", &[("breakingCapacity", D)]),
    ("Breaker", "ProtectedSwitch", &[("inTransitTime", D)]),
    ("LoadBreakSwitch", "ProtectedSwitch", &[]),
    ("Connector", "ConductingEquipment", &[]),
    ("BusbarSection", "Connector", &[("ipMax", D)]),
    ("Junction", "Connector", &[]),
    (
        "PowerTransformer",
        "ConductingEquipment",
        &[("beforeShCircuitHighestOperatingCurrent", D), ("isPartOfGeneratorUnit", B), ("vectorGroup", S)],
    ),
    ("ConnectivityNodeContainer", "PowerSystemResource", &[]),
    ("EquipmentContainer", "ConnectivityNodeContainer", &[]),
    ("Substation", "EquipmentContainer", &[("Region", R)]),
    (
        "VoltageLevel",
        "EquipmentContainer",
        &[("highVoltageLimit", D), ("lowVoltageLimit", D), ("BaseVoltage", R), ("Substation", R)],
    ),
    ("Line", "EquipmentContainer", &[("Region", R)]),
    (
        "ACDCTerminal",
        "IdentifiedObject",
        &[("connected", B), ("sequenceNumber", I), ("BusNameMarker", R)],
    ),
    (
        "Terminal",
        "ACDCTerminal",
        &[("phases", S), ("ConductingEquipment", R), ("ConnectivityNode", R), ("TopologicalNode", R)],
    ),
    (
        "ConnectivityNode",
        "IdentifiedObject",
        &[("ConnectivityNodeContainer", R), ("TopologicalNode", R)],
    ),
    ("BaseVoltage", "IdentifiedObject", &[("nominalVoltage", D)]),
    (
        "Location",
        "IdentifiedObject",
        &[("direction", S), ("geoInfoReference", S), ("type", S), ("CoordinateSystem", R)],
    ),
    ("CoordinateSystem", "IdentifiedObject", &[("crsUrn", S)]),
    ("PSRType", "IdentifiedObject", &[]),
    (
        "PositionPoint",
        ROOT_CLASS,
        &[
            ("sequenceNumber", I),
            ("xPosition", S),
            ("yPosition", S),
            ("zPosition", S),
            ("Location", R),
        ],
    ),
    (
        "TransformerEnd",
        "IdentifiedObject",
        &[
            ("bmagSat", D),
            ("endNumber", I),
            ("grounded", B),
            ("magBaseU", D),
            ("magSatFlux", D),
            ("rground", D),
            ("xground", D),
            ("BaseVoltage", R),
            ("CoreAdmittance", R),
            ("PhaseTapChanger", R),
            ("RatioTapChanger", R),
            ("StarImpedance", R),
            ("Terminal", R),
        ],
    ),
    (
        "PowerTransformerEnd",
        "TransformerEnd",
        &[
            ("b", D),
            ("b0", D),
            ("connectionKind", S),
            ("g", D),
            ("g0", D),
            ("phaseAngleClock", I),
            ("r", D),
            ("r0", D),
            ("ratedS", D),
            ("ratedU", D),
            ("x", D),
            ("x0", D),
            ("PowerTransformer", R),
        ],
    ),
];

/// The built-in class definitions, root first
pub(crate) fn builtin_classes() -> Vec<ClassDef> {
    let root = ClassDef {
        name: ROOT_CLASS.to_string(),
        superclass: None,
        fields: vec![FieldDef::new(ID_FIELD, S)],
    };

    std::iter::once(root)
        .chain(BUILTIN.iter().map(|(name, superclass, fields)| ClassDef {
            name: name.to_string(),
            superclass: Some(superclass.to_string()),
            fields: fields
                .iter()
                .map(|(field, kind)| FieldDef {
                    name: field.to_string(),
                    kind: *kind,
                    identifier: *name == "IdentifiedObject" && *field == "mRID",
                })
                .collect(),
        }))
        .collect()
}
