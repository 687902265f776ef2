//! Coercion of a publisher's `categories` field into plain strings.
//!
//! Feeds disagree wildly on this field. Depending on the publisher and the
//! XML parser it arrives as nothing, a single string, a string holding a JSON
//! array, an array of strings, or an array of tag objects where the display
//! text lives under `_` and attributes sit beside it
//! (`{"_": "Tech", "domain": "https://..."}`).

use serde_json::Value;
use thiserror::Error;

/// Key that tag objects use for their display text.
const DISPLAY_TEXT_FIELD: &str = "_";

/// Serializing a `Value` cannot fail today; the error path keeps the
/// all-or-nothing fallback in place if entries ever carry other types.
#[derive(Debug, Error)]
enum CategoryError {
    #[error("category could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Normalize a raw `categories` value into an ordered list of strings.
///
/// - absent or `null` → `[]`
/// - a string is parsed as JSON first; an array result is normalized like
///   any other array, anything else keeps the original string as the sole
///   category
/// - arrays are classified by their first element only: a leading string
///   means a string array (order preserved), anything else means an array of
///   tag objects whose `_` text is extracted
/// - any other value is treated as a one-element tag array
///
/// Never fails: if any element cannot be converted the whole field becomes
/// `[]` rather than a partial list.
pub fn normalize_categories(raw: Option<&Value>) -> Vec<String> {
    match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(parsed)) => normalize_array(&parsed),
            Ok(_) => vec![text.clone()],
            Err(e) => {
                tracing::debug!(error = %e, "Categories string is not JSON, using it verbatim");
                vec![text.clone()]
            }
        },
        Some(Value::Array(items)) => normalize_array(items),
        Some(other) => normalize_array(std::slice::from_ref(other)),
    }
}

fn normalize_array(items: &[Value]) -> Vec<String> {
    let Some(first) = items.first() else {
        return Vec::new();
    };

    let mapped: Result<Vec<String>, CategoryError> = if first.is_string() {
        items.iter().map(plain_entry).collect()
    } else {
        items.iter().map(tagged_entry).collect()
    };

    mapped.unwrap_or_else(|e| {
        tracing::debug!(error = %e, count = items.len(), "Dropping unconvertible categories");
        Vec::new()
    })
}

/// Element of a string array. Stragglers of other types are stringified.
fn plain_entry(value: &Value) -> Result<String, CategoryError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

/// Element of a tag-object array.
fn tagged_entry(value: &Value) -> Result<String, CategoryError> {
    match value {
        Value::Object(fields) => match fields.get(DISPLAY_TEXT_FIELD) {
            Some(Value::String(text)) if !text.is_empty() => Ok(text.clone()),
            // Empty, null, false or zero display text carries no label.
            None | Some(Value::Null) | Some(Value::Bool(false)) | Some(Value::String(_)) => {
                Ok(serde_json::to_string(value)?)
            }
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(serde_json::to_string(value)?),
            Some(text) => Ok(serde_json::to_string(text)?),
        },
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}
