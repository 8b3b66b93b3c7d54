use serde_json::{Map, Value};

/// Find the first well-formed JSON object embedded in model text.
///
/// Models wrap payloads in commentary or code fences. Every `{` is tried as
/// a start position in order; the first one that parses to an object wins
/// and whatever follows it is ignored.
pub fn find_payload(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(idx, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

/// Like [`find_payload`], then retry with Python-style single quotes
/// turned into double quotes.
pub fn find_payload_lenient(text: &str) -> Option<Map<String, Value>> {
    find_payload(text).or_else(|| {
        if text.contains('\'') {
            find_payload(&text.replace('\'', "\""))
        } else {
            None
        }
    })
}

/// Whether a bare answer is the absence sentinel, e.g. `none`, `"None".`
pub fn is_bare_sentinel(text: &str, sentinel: &str) -> bool {
    let trimmed = text
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c.is_whitespace());
    trimmed.eq_ignore_ascii_case(sentinel)
}
