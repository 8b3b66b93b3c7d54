use super::{FieldSpec, FieldType, Schema, Task};

const YES_NO: &[&str] = &["yes", "no"];

const SYNTHESIS_METHODS: &[&str] = &[
    "solid_state",
    "mechanical_milling",
    "liquid_phase",
    "melt_quench",
    "other",
];

const CRYSTAL_SYSTEMS: &[&str] = &[
    "cubic",
    "tetragonal",
    "orthorhombic",
    "hexagonal",
    "trigonal",
    "monoclinic",
    "triclinic",
];

static EXISTENCE_SCHEMA: Schema = Schema {
    task: Task::ExistenceCheck,
    fields: &[FieldSpec {
        name: "electrolyte_exists",
        field_type: FieldType::Enum(YES_NO),
        description: "\"yes\" if the patent describes how a solid electrolyte is synthesised, otherwise \"no\"",
        allows_absent: false,
    }],
};

static COMPOSITION_SCHEMA: Schema = Schema {
    task: Task::Composition,
    fields: &[FieldSpec {
        name: "electrolyte",
        field_type: FieldType::StringMap,
        description: "element proportion of the electrolyte (from its chemical formula or an ICP reading); keys are the elements, values their proportions as written in the text",
        allows_absent: true,
    }],
};

static PRECURSOR_SCHEMA: Schema = Schema {
    task: Task::PrecursorSet,
    fields: &[FieldSpec {
        name: "precursors",
        field_type: FieldType::StringMap,
        description: "precursors used to synthesise the electrolyte; keys are the precursors in chemical formula, values their dosage or mass as written in the text, or \"none\" when the dosage is not given",
        allows_absent: true,
    }],
};

static CONDUCTIVITY_SCHEMA: Schema = Schema {
    task: Task::Conductivity,
    fields: &[FieldSpec {
        name: "conductivity",
        field_type: FieldType::String,
        description: "ionic conductivity of the electrolyte exactly as written in the text, including its unit",
        allows_absent: true,
    }],
};

static SYNTHESIS_SCHEMA: Schema = Schema {
    task: Task::SynthesisMethod,
    fields: &[
        FieldSpec {
            name: "synthesis_method",
            field_type: FieldType::Enum(SYNTHESIS_METHODS),
            description: "route used to synthesise the electrolyte",
            allows_absent: true,
        },
        FieldSpec {
            name: "synthesis_conditions",
            field_type: FieldType::NumberMap,
            description: "numeric process conditions keyed by name with the unit as suffix, e.g. \"milling_time_h\", \"sintering_temperature_c\"",
            allows_absent: true,
        },
    ],
};

static STRUCTURE_SCHEMA: Schema = Schema {
    task: Task::CrystalStructure,
    fields: &[
        FieldSpec {
            name: "crystal_system",
            field_type: FieldType::Enum(CRYSTAL_SYSTEMS),
            description: "crystal system of the electrolyte",
            allows_absent: true,
        },
        FieldSpec {
            name: "space_group",
            field_type: FieldType::String,
            description: "space group of the electrolyte in Hermann-Mauguin notation, e.g. \"F-43m\"",
            allows_absent: true,
        },
    ],
};

/// Look up the output contract of a task. Plain-text tasks have none.
pub fn schema_for(task: Task) -> Option<&'static Schema> {
    match task {
        Task::ExampleIsolation => None,
        Task::ExistenceCheck => Some(&EXISTENCE_SCHEMA),
        Task::Composition => Some(&COMPOSITION_SCHEMA),
        Task::PrecursorSet => Some(&PRECURSOR_SCHEMA),
        Task::Conductivity => Some(&CONDUCTIVITY_SCHEMA),
        Task::SynthesisMethod => Some(&SYNTHESIS_SCHEMA),
        Task::CrystalStructure => Some(&STRUCTURE_SCHEMA),
    }
}

/// Field names a task writes into the document record.
pub fn output_fields(task: Task) -> Vec<&'static str> {
    schema_for(task)
        .map(|s| s.field_names().collect())
        .unwrap_or_default()
}
