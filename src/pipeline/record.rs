//! Accumulated per-document extraction output.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use super::decode::{ExtractionResult, FieldValue, TaskOutput};
use super::schema::output_fields;
use super::Task;

/// Key holding the isolated example text in the persisted record.
pub const EXAMPLE_KEY: &str = "example";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("Field '{field}' is already set on record {document}")]
    FieldCollision { field: String, document: String },
}

/// What a stage left for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Value(FieldValue),
    /// Persisted as `{"error": "<reason>"}`.
    Failed { reason: String },
}

impl FieldOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl Serialize for FieldOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Failed { reason } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", reason)?;
                map.end()
            }
        }
    }
}

/// One document's record: identity, isolated example, field outcomes.
///
/// Fields are a write-once union. Equality ignores field order, so records
/// built from the same stages in any order compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    source: String,
    example: Option<String>,
    fields: IndexMap<String, FieldOutcome>,
}

impl DocumentRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            example: None,
            fields: IndexMap::new(),
        }
    }

    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    pub fn set_example(&mut self, text: impl Into<String>) {
        self.example = Some(text.into());
    }

    pub fn fields(&self) -> &IndexMap<String, FieldOutcome> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FieldOutcome> {
        self.fields.get(field)
    }

    /// Number of fields holding a failure marker.
    pub fn failed_count(&self) -> usize {
        self.fields.values().filter(|f| f.is_failed()).count()
    }

    /// Add decoded values. Nothing is written if any key is already taken;
    /// the existing value is kept.
    pub fn merge(&mut self, values: IndexMap<String, FieldValue>) -> Result<(), MergeError> {
        self.check_free(values.keys().map(String::as_str))?;
        self.fields
            .extend(values.into_iter().map(|(k, v)| (k, FieldOutcome::Value(v))));
        Ok(())
    }

    /// Mark every named field as failed with `reason`.
    pub fn merge_failure(&mut self, fields: &[&str], reason: &str) -> Result<(), MergeError> {
        self.check_free(fields.iter().copied())?;
        for field in fields {
            self.fields.insert(
                field.to_string(),
                FieldOutcome::Failed {
                    reason: reason.to_string(),
                },
            );
        }
        Ok(())
    }

    /// Fold a stage result into the record. Plain-text results carry no
    /// fields and are ignored here.
    pub fn apply(&mut self, task: Task, result: &ExtractionResult) -> Result<(), MergeError> {
        match result {
            ExtractionResult::Ok(TaskOutput::Fields(values)) => self.merge(values.clone()),
            ExtractionResult::Ok(TaskOutput::Text(_)) => Ok(()),
            ExtractionResult::DecodeFailure { reason, .. } => {
                self.merge_failure(&output_fields(task), reason)
            }
        }
    }

    /// Pretty JSON with non-ASCII characters kept literally.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn check_free<'k>(&self, mut keys: impl Iterator<Item = &'k str>) -> Result<(), MergeError> {
        match keys.find(|k| *k == EXAMPLE_KEY || self.fields.contains_key(*k)) {
            Some(field) => Err(MergeError::FieldCollision {
                field: field.to_string(),
                document: self.source.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Serialize for DocumentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.fields.len() + usize::from(self.example.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(example) = &self.example {
            map.serialize_entry(EXAMPLE_KEY, example)?;
        }
        for (name, outcome) in &self.fields {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, FieldValue)]) -> IndexMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn composition() -> IndexMap<String, FieldValue> {
        let map = [("Li", "6"), ("P", "1"), ("S", "5"), ("Cl", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        values(&[("electrolyte", FieldValue::TextMap(map))])
    }

    fn conductivity() -> IndexMap<String, FieldValue> {
        values(&[("conductivity", FieldValue::Text("2.1 mS/cm".into()))])
    }

    #[test]
    fn merge_is_commutative_for_disjoint_fields() {
        let mut a = DocumentRecord::new("CN1");
        a.merge(composition()).unwrap();
        a.merge(conductivity()).unwrap();

        let mut b = DocumentRecord::new("CN1");
        b.merge(conductivity()).unwrap();
        b.merge(composition()).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn collision_keeps_first_writer() {
        let mut record = DocumentRecord::new("CN1");
        record.merge(composition()).unwrap();

        let second = values(&[("electrolyte", FieldValue::Absent)]);
        let err = record.merge(second).unwrap_err();
        assert_eq!(
            err,
            MergeError::FieldCollision {
                field: "electrolyte".into(),
                document: "CN1".into()
            }
        );
        assert!(matches!(
            record.get("electrolyte"),
            Some(FieldOutcome::Value(FieldValue::TextMap(_)))
        ));
    }

    #[test]
    fn collision_writes_nothing() {
        let mut record = DocumentRecord::new("CN1");
        record.merge(conductivity()).unwrap();
        let mixed = values(&[
            ("crystal_system", FieldValue::Choice("cubic".into())),
            ("conductivity", FieldValue::Absent),
        ]);
        assert!(record.merge(mixed).is_err());
        assert!(record.get("crystal_system").is_none());
    }

    #[test]
    fn example_key_is_reserved() {
        let mut record = DocumentRecord::new("CN1");
        let err = record
            .merge(values(&[("example", FieldValue::Text("x".into()))]))
            .unwrap_err();
        assert!(matches!(err, MergeError::FieldCollision { ref field, .. } if field == "example"));
    }

    #[test]
    fn decode_failure_marks_every_task_field() {
        let mut record = DocumentRecord::new("US9");
        let failure = ExtractionResult::DecodeFailure {
            raw: "garbage".into(),
            reason: "no parseable payload".into(),
        };
        record.apply(Task::SynthesisMethod, &failure).unwrap();

        assert_eq!(record.failed_count(), 2);
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["synthesis_method"]["error"], "no parseable payload");
        assert_eq!(json["synthesis_conditions"]["error"], "no parseable payload");
    }

    #[test]
    fn serializes_example_first_and_keeps_unicode() {
        let mut record = DocumentRecord::new("CN114");
        record.merge(conductivity()).unwrap();
        record
            .merge(values(&[("precursors", FieldValue::Absent)]))
            .unwrap();
        record.set_example("实施例1: Li₂S と P₂S₅");

        let json = record.to_json_pretty().unwrap();
        let example_at = json.find("\"example\"").unwrap();
        let conductivity_at = json.find("\"conductivity\"").unwrap();
        let precursors_at = json.find("\"precursors\"").unwrap();
        assert!(example_at < conductivity_at && conductivity_at < precursors_at);
        assert!(json.contains("实施例1: Li₂S と P₂S₅"));
        assert!(json.contains("\"precursors\": \"none\""));
    }
}
