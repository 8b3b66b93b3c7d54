use serde_json::{json, Map, Value};

use super::{FieldSpec, FieldType, Schema, ABSENT_SENTINEL};

/// JSON schema fragment for one field.
fn field_schema(field: &FieldSpec) -> Value {
    let base = match field.field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::StringMap => json!({
            "type": "object",
            "additionalProperties": { "type": "string" }
        }),
        FieldType::NumberMap => json!({
            "type": "object",
            "additionalProperties": { "type": "number" }
        }),
        FieldType::Enum(values) => json!({ "type": "string", "enum": values }),
    };

    let typed = if field.allows_absent {
        json!({ "anyOf": [base, { "const": ABSENT_SENTINEL }] })
    } else {
        base
    };

    match typed {
        Value::Object(mut obj) => {
            obj.insert("description".into(), Value::String(field.description.into()));
            Value::Object(obj)
        }
        other => other,
    }
}

/// The JSON schema describing a task's output object.
pub fn json_schema(schema: &Schema) -> Value {
    let mut properties = Map::new();
    for field in schema.fields {
        properties.insert(field.name.to_string(), field_schema(field));
    }
    let required: Vec<&str> = schema.field_names().collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Render the format instructions for a schema.
///
/// The result is already escaped for the prompt template syntax, so it can
/// be spliced into template content without introducing placeholders.
pub fn render_instructions(schema: &Schema) -> String {
    let schema_text = serde_json::to_string_pretty(&json_schema(schema))
        .unwrap_or_else(|_| "{}".to_string());

    let mut text = String::from(
        "Answer with exactly one JSON object and no other JSON. \
         The object must conform to the JSON schema below.\n\n",
    );
    text.push_str("```json\n");
    text.push_str(&schema_text);
    text.push_str("\n```\n\nFields:\n");

    for field in schema.fields {
        text.push_str(&format!("- \"{}\": {}", field.name, field.description));
        if field.allows_absent {
            text.push_str(&format!(
                ". If the text does not contain this information, use the string \"{ABSENT_SENTINEL}\""
            ));
        }
        text.push_str(".\n");
    }

    escape_braces(&text)
}

/// Escape template placeholder syntax so text is taken literally.
pub fn escape_braces(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '{' => out.push_str("{{"),
            '}' => out.push_str("}}"),
            other => out.push(other),
        }
    }
    out
}
