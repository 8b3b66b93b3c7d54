//! Output decoding: raw model text into a task's typed fields.
//!
//! Decoding never fails with an error. A payload that cannot be read or
//! does not match the schema becomes `ExtractionResult::DecodeFailure`,
//! carrying the raw text and a reason.

pub mod payload;

pub use payload::{find_payload, find_payload_lenient, is_bare_sentinel};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use super::schema::{FieldSpec, FieldType, Schema, Task, ABSENT_SENTINEL};

/// A decoded, schema-checked field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    TextMap(IndexMap<String, String>),
    NumberMap(IndexMap<String, f64>),
    Choice(String),
    /// The source text confirmed the information is absent.
    Absent,
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) | Self::Choice(s) => serializer.serialize_str(s),
            Self::Absent => serializer.serialize_str(ABSENT_SENTINEL),
            Self::TextMap(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Self::NumberMap(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Successful output of one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// Plain-text tasks (example isolation).
    Text(String),
    /// Schema-bound tasks, keyed by field name in schema order.
    Fields(IndexMap<String, FieldValue>),
}

/// Outcome of decoding one model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Ok(TaskOutput),
    DecodeFailure { raw: String, reason: String },
}

impl ExtractionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    fn failure(raw: &str, reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// Decode raw model text for a task.
///
/// Plain-text tasks are the identity. Schema-bound tasks locate the first
/// JSON object in the text and validate it field by field; unknown keys in
/// the payload are ignored.
pub fn decode(task: Task, raw: &str) -> ExtractionResult {
    let Some(schema) = task.schema() else {
        return ExtractionResult::Ok(TaskOutput::Text(raw.to_string()));
    };

    let payload = match find_payload_lenient(raw) {
        Some(payload) => payload,
        None if schema.fields.iter().all(|f| f.allows_absent)
            && is_bare_sentinel(raw, ABSENT_SENTINEL) =>
        {
            let fields = schema
                .fields
                .iter()
                .map(|f| (f.name.to_string(), FieldValue::Absent))
                .collect();
            return ExtractionResult::Ok(TaskOutput::Fields(fields));
        }
        None => return ExtractionResult::failure(raw, "no parseable payload"),
    };

    match validate(schema, &payload) {
        Ok(fields) => ExtractionResult::Ok(TaskOutput::Fields(fields)),
        Err(reason) => ExtractionResult::failure(raw, reason),
    }
}

/// Check a payload against a schema, converting each field.
pub fn validate(
    schema: &Schema,
    payload: &Map<String, Value>,
) -> Result<IndexMap<String, FieldValue>, String> {
    let mut fields = IndexMap::with_capacity(schema.fields.len());
    for spec in schema.fields {
        let value = payload
            .get(spec.name)
            .ok_or_else(|| format!("field {} missing", spec.name))?;
        let converted =
            convert(spec, value).ok_or_else(|| format!("type mismatch on field {}", spec.name))?;
        fields.insert(spec.name.to_string(), converted);
    }
    Ok(fields)
}

fn is_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().eq_ignore_ascii_case(ABSENT_SENTINEL),
        _ => false,
    }
}

/// Scalar rendered as text. Numbers keep their JSON spelling.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn convert(spec: &FieldSpec, value: &Value) -> Option<FieldValue> {
    if spec.allows_absent && is_sentinel(value) {
        return Some(FieldValue::Absent);
    }

    match spec.field_type {
        FieldType::String => scalar_text(value).map(FieldValue::Text),
        FieldType::StringMap => {
            let obj = value.as_object()?;
            let mut map = IndexMap::with_capacity(obj.len());
            for (k, v) in obj {
                let text = match v {
                    Value::Null => ABSENT_SENTINEL.to_string(),
                    other => scalar_text(other)?,
                };
                map.insert(k.clone(), text);
            }
            Some(FieldValue::TextMap(map))
        }
        FieldType::NumberMap => {
            let obj = value.as_object()?;
            let mut map = IndexMap::with_capacity(obj.len());
            for (k, v) in obj {
                let number = match v {
                    Value::Number(n) => n.as_f64()?,
                    Value::String(s) => s.trim().parse::<f64>().ok()?,
                    _ => return None,
                };
                // "NaN" and "inf" parse as f64 but are not measurements.
                if !number.is_finite() {
                    return None;
                }
                map.insert(k.clone(), number);
            }
            Some(FieldValue::NumberMap(map))
        }
        FieldType::Enum(variants) => {
            let s = value.as_str()?;
            let normalized = s.trim().replace([' ', '-'], "_");
            variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(&normalized))
                .map(|v| FieldValue::Choice(v.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(result: ExtractionResult) -> IndexMap<String, FieldValue> {
        match result {
            ExtractionResult::Ok(TaskOutput::Fields(f)) => f,
            other => panic!("expected fields, got {other:?}"),
        }
    }

    fn reason(result: ExtractionResult) -> String {
        match result {
            ExtractionResult::DecodeFailure { reason, .. } => reason,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_task_is_identity() {
        let raw = "  Example 1\nLi2S and P2S5 {not json} were mixed.  ";
        assert_eq!(
            decode(Task::ExampleIsolation, raw),
            ExtractionResult::Ok(TaskOutput::Text(raw.to_string()))
        );
        assert!(decode(Task::ExampleIsolation, "").is_ok());
    }

    #[test]
    fn composition_scenario_decodes_proportions() {
        let raw = r#"{"electrolyte": {"Li": "1.5", "S": "2.0", "P": "0.5"}}"#;
        let f = fields(decode(Task::Composition, raw));
        let FieldValue::TextMap(map) = &f["electrolyte"] else {
            panic!("expected text map");
        };
        assert_eq!(map["Li"], "1.5");
        assert_eq!(map["S"], "2.0");
        assert_eq!(map["P"], "0.5");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn embedded_payload_ignores_commentary() {
        let raw = r#"Sure! {"conductivity": "2.0e-3 S/cm"} Let me know if you need more."#;
        let f = fields(decode(Task::Conductivity, raw));
        assert_eq!(f["conductivity"], FieldValue::Text("2.0e-3 S/cm".into()));
    }

    #[test]
    fn sentinel_is_ok_not_failure() {
        let f = fields(decode(Task::Conductivity, r#"{"conductivity": "none"}"#));
        assert_eq!(f["conductivity"], FieldValue::Absent);

        let f = fields(decode(Task::Conductivity, "None."));
        assert_eq!(f["conductivity"], FieldValue::Absent);
    }

    #[test]
    fn bare_sentinel_rejected_when_not_permitted() {
        let r = reason(decode(Task::ExistenceCheck, "none"));
        assert_eq!(r, "no parseable payload");
    }

    #[test]
    fn sentinel_rejected_on_non_permitting_field() {
        let r = reason(decode(Task::ExistenceCheck, r#"{"electrolyte_exists": "none"}"#));
        assert_eq!(r, "type mismatch on field electrolyte_exists");
    }

    #[test]
    fn no_payload_is_failure_with_raw_text() {
        let raw = "I could not find anything relevant.";
        match decode(Task::PrecursorSet, raw) {
            ExtractionResult::DecodeFailure { raw: r, reason } => {
                assert_eq!(r, raw);
                assert_eq!(reason, "no parseable payload");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_field_is_reported() {
        let r = reason(decode(Task::CrystalStructure, r#"{"crystal_system": "cubic"}"#));
        assert_eq!(r, "field space_group missing");
    }

    #[test]
    fn wrong_type_is_reported() {
        let r = reason(decode(Task::Composition, r#"{"electrolyte": ["Li", "S"]}"#));
        assert_eq!(r, "type mismatch on field electrolyte");

        let r = reason(decode(
            Task::SynthesisMethod,
            r#"{"synthesis_method": "solid_state", "synthesis_conditions": {"time": "long"}}"#,
        ));
        assert_eq!(r, "type mismatch on field synthesis_conditions");
    }

    #[test]
    fn non_finite_conditions_are_mismatch() {
        for raw in [
            r#"{"synthesis_method": "solid_state", "synthesis_conditions": {"t": "NaN"}}"#,
            r#"{"synthesis_method": "solid_state", "synthesis_conditions": {"t": "550", "u": "inf"}}"#,
            r#"{"synthesis_method": "solid_state", "synthesis_conditions": {"t": " -Infinity "}}"#,
        ] {
            let r = reason(decode(Task::SynthesisMethod, raw));
            assert_eq!(r, "type mismatch on field synthesis_conditions", "{raw}");
        }

        let raw = r#"{"synthesis_method": "solid_state", "synthesis_conditions": {"t": "1e3"}}"#;
        let f = fields(decode(Task::SynthesisMethod, raw));
        let FieldValue::NumberMap(map) = &f["synthesis_conditions"] else {
            panic!("expected number map");
        };
        assert_eq!(map["t"], 1000.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let raw = r#"{"conductivity": "1 mS/cm", "temperature": "25 C"}"#;
        let f = fields(decode(Task::Conductivity, raw));
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn enum_match_is_case_insensitive_and_canonical() {
        let raw = r#"{"synthesis_method": "Mechanical Milling", "synthesis_conditions": {"milling_time_h": "20"}}"#;
        let f = fields(decode(Task::SynthesisMethod, raw));
        assert_eq!(f["synthesis_method"], FieldValue::Choice("mechanical_milling".into()));
        let FieldValue::NumberMap(conditions) = &f["synthesis_conditions"] else {
            panic!("expected number map");
        };
        assert!((conditions["milling_time_h"] - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_enum_value_is_mismatch() {
        let r = reason(decode(Task::ExistenceCheck, r#"{"electrolyte_exists": "maybe"}"#));
        assert_eq!(r, "type mismatch on field electrolyte_exists");
    }

    #[test]
    fn numeric_map_values_become_text() {
        let f = fields(decode(Task::Composition, r#"{"electrolyte": {"Li": 6, "P": 1.0}}"#));
        let FieldValue::TextMap(map) = &f["electrolyte"] else {
            panic!("expected text map");
        };
        assert_eq!(map["Li"], "6");
        assert_eq!(map["P"], "1.0");
    }

    #[test]
    fn null_dosage_becomes_sentinel_text() {
        let f = fields(decode(Task::PrecursorSet, r#"{"precursors": {"LiCl": null}}"#));
        let FieldValue::TextMap(map) = &f["precursors"] else {
            panic!("expected text map");
        };
        assert_eq!(map["LiCl"], "none");
    }

    #[test]
    fn well_formed_payload_round_trips() {
        let cases = [
            (Task::ExistenceCheck, r#"{"electrolyte_exists": "yes"}"#),
            (Task::Composition, r#"{"electrolyte": {"Li": "6", "P": "1", "S": "5", "Cl": "1"}}"#),
            (Task::PrecursorSet, r#"{"precursors": {"Li2S": "0.39 g", "LiCl": "none"}}"#),
            (Task::Conductivity, r#"{"conductivity": "2.5 mS/cm"}"#),
            (
                Task::SynthesisMethod,
                r#"{"synthesis_method": "solid_state", "synthesis_conditions": {"sintering_temperature_c": 550.0}}"#,
            ),
            (Task::CrystalStructure, r#"{"crystal_system": "cubic", "space_group": "none"}"#),
        ];

        for (task, raw) in cases {
            let input: Value = serde_json::from_str(raw).unwrap();
            let decoded = fields(decode(task, raw));
            let encoded: Map<String, Value> = decoded
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            assert_eq!(Value::Object(encoded), input, "{task}");
        }
    }
}
