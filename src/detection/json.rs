//! Extraction of an embedded JSON object from free-form model output

use serde_json::Value;

/// Return the first well-formed JSON object embedded in `text`.
///
/// Each `{` is tried in order as the start of an object; trailing prose after
/// a complete object is ignored.
pub fn extract_json_object(text: &str) -> Option<Value> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}
