//! Recovery of a JSON object from raw model output.
//!
//! Models asked for JSON still wrap it in markdown fences or commentary. This
//! strips the fences, tries a direct parse, and otherwise parses the span from
//! the first `{` to the last `}`. Malformed JSON syntax is not repaired.

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Model output was not valid JSON: {raw}")]
    InvalidJson { raw: String },
}

/// Parse model output into a JSON object.
pub fn parse_model_json(raw: &str) -> Result<Map<String, Value>, RecoveryError> {
    let de_fenced = strip_code_fence(raw);

    if let Some(object) = parse_object(de_fenced) {
        return Ok(object);
    }

    if let (Some(start), Some(end)) = (de_fenced.find('{'), de_fenced.rfind('}')) {
        if start < end {
            if let Some(object) = parse_object(&de_fenced[start..=end]) {
                return Ok(object);
            }
        }
    }

    Err(RecoveryError::InvalidJson {
        raw: raw.to_string(),
    })
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` marker and a trailing
/// ```` ``` ````, case-insensitively, then trim.
fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = strip_prefix_ignore_case(s, "```json") {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.trim_start();
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest.trim_end();
    }

    s.trim()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}
