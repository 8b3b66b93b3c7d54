use crate::pipeline::schema::Task;

/// A literal context/output pair shown to the model as guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exemplar {
    pub context: &'static str,
    pub output: &'static str,
}

const COMPOSITION: &[Exemplar] = &[
    Exemplar {
        context: "an argyrodite-type solid electrolyte represented by Li6PS5Cl was obtained.",
        output: r#"{"electrolyte": {"Li": "6", "P": "1", "S": "5", "Cl": "1"}}"#,
    },
    Exemplar {
        context: "ICP analysis of the obtained powder gave Li:P:S:I = 3.2:1.0:4.1:0.9 (molar ratio).",
        output: r#"{"electrolyte": {"Li": "3.2", "P": "1.0", "S": "4.1", "I": "0.9"}}"#,
    },
    Exemplar {
        context: "the mixture was milled for 20 hours in an argon atmosphere.",
        output: r#"{"electrolyte": "none"}"#,
    },
];

const PRECURSORS: &[Exemplar] = &[
    Exemplar {
        context: "Li2S (0.39 g), P2S5 (0.56 g) and LiCl were weighed in a glove box.",
        output: r#"{"precursors": {"Li2S": "0.39 g", "P2S5": "0.56 g", "LiCl": "none"}}"#,
    },
    Exemplar {
        context: "the obtained glass ceramic had an ionic conductivity of 1.2 mS/cm.",
        output: r#"{"precursors": "none"}"#,
    },
];

const CONDUCTIVITY: &[Exemplar] = &[
    Exemplar {
        context: "the ionic conductivity of the pellet measured at 25 °C was 2.5 mS/cm.",
        output: r#"{"conductivity": "2.5 mS/cm"}"#,
    },
    Exemplar {
        context: "the powder was pressed into a pellet at 375 MPa.",
        output: r#"{"conductivity": "none"}"#,
    },
];

const SYNTHESIS: &[Exemplar] = &[Exemplar {
    context: "the raw materials were milled in a planetary ball mill at 500 rpm for 20 hours \
              and the product was heated at 550 °C for 8 hours.",
    output: r#"{"synthesis_method": "mechanical_milling", "synthesis_conditions": {"milling_speed_rpm": 500, "milling_time_h": 20, "heat_treatment_temperature_c": 550, "heat_treatment_time_h": 8}}"#,
}];

const STRUCTURE: &[Exemplar] = &[Exemplar {
    context: "X-ray diffraction showed a single argyrodite phase with space group F-43m.",
    output: r#"{"crystal_system": "cubic", "space_group": "F-43m"}"#,
}];

/// Few-shot exemplars shipped with a task's template.
pub fn exemplars_for(task: Task) -> &'static [Exemplar] {
    match task {
        Task::Composition => COMPOSITION,
        Task::PrecursorSet => PRECURSORS,
        Task::Conductivity => CONDUCTIVITY,
        Task::SynthesisMethod => SYNTHESIS,
        Task::CrystalStructure => STRUCTURE,
        Task::ExampleIsolation | Task::ExistenceCheck => &[],
    }
}
