//! Interpretation Response Parsing
//!
//! Parses language-service output into a validated `Interpretation`.
//! The response is untrusted: presentation noise (reasoning blocks, code
//! fences, surrounding prose, key spelling) is tolerated, but every field
//! must be present, typed correctly and inside its domain.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::defaults::{MAX_PEOPLE_IN_LINE, MAX_WAIT_MINS};
use crate::types::{normalize_label, EntryOutcome, Interpretation, MovementRate};

pub const FIELD_PEOPLE: &str = "estPplInLine";
pub const FIELD_WAIT: &str = "estimatedWaitMins";
pub const FIELD_MOVEMENT: &str = "movementRate";
pub const FIELD_ENTRY: &str = "entryOutcome";
pub const FIELD_CONFIDENCE: &str = "aiConfidence";

/// Why a language-service response was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("no JSON object found in response")]
    NoPayload,

    #[error("malformed JSON object: {0}")]
    Malformed(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' appears more than once with different values")]
    ConflictingField(&'static str),

    #[error("field '{field}' is not a number: {value}")]
    NotANumber { field: &'static str, value: String },

    #[error("field '{field}' = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("field '{field}' has unknown value '{value}' (allowed: {allowed})")]
    UnknownCategory {
        field: &'static str,
        value: String,
        allowed: String,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

/// Parse and validate an interpretation response.
pub fn parse_interpretation(
    text: &str,
    interpreted_at: DateTime<Utc>,
) -> Result<Interpretation, FormatError> {
    let body = strip_think_tags(text);
    let object = extract_json_object(body)?;

    let people = required_number(&object, FIELD_PEOPLE)?;
    if !(0.0..=MAX_PEOPLE_IN_LINE).contains(&people) {
        return Err(FormatError::OutOfRange {
            field: FIELD_PEOPLE,
            value: people,
            expected: "0 to 100000",
        });
    }
    if people.fract() != 0.0 {
        return Err(FormatError::OutOfRange {
            field: FIELD_PEOPLE,
            value: people,
            expected: "a whole number",
        });
    }

    let wait = required_number(&object, FIELD_WAIT)?;
    if !(0.0..=MAX_WAIT_MINS).contains(&wait) {
        return Err(FormatError::OutOfRange {
            field: FIELD_WAIT,
            value: wait,
            expected: "0 to 10080 minutes",
        });
    }

    let movement_rate = required_category(&object, FIELD_MOVEMENT, MovementRate::from_label, || {
        MovementRate::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    })?;

    let entry_outcome = required_category(&object, FIELD_ENTRY, EntryOutcome::from_label, || {
        EntryOutcome::ALL.iter().map(|o| o.as_str()).collect::<Vec<_>>().join(", ")
    })?;

    let confidence = required_number(&object, FIELD_CONFIDENCE)?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(FormatError::OutOfRange {
            field: FIELD_CONFIDENCE,
            value: confidence,
            expected: "0 to 1",
        });
    }

    // Range-checked whole number above, the cast cannot truncate
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let est_ppl_in_line = people as u32;

    Ok(Interpretation {
        est_ppl_in_line,
        estimated_wait_mins: wait,
        movement_rate,
        entry_outcome,
        ai_confidence: confidence,
        interpreted_at,
    })
}

// ============================================================================
// Internal Parsing Helpers
// ============================================================================

/// Drop `<think>...</think>` reasoning that some models emit before the
/// answer. An unclosed tag keeps everything after it, since the JSON may
/// still follow inside the unterminated block.
fn strip_think_tags(text: &str) -> &str {
    if let Some(end) = text.rfind("</think>") {
        return &text[end + "</think>".len()..];
    }
    if let Some(start) = text.find("<think>") {
        return &text[start + "<think>".len()..];
    }
    text
}

/// Find the first balanced `{...}` span that parses as a JSON object.
///
/// Fences and prose around the object are skipped by construction.
fn extract_json_object(text: &str) -> Result<Map<String, Value>, FormatError> {
    let mut last_error: Option<String> = None;

    for (start, _) in text.match_indices('{') {
        let Some(candidate) = balanced_span(&text[start..]) else {
            last_error.get_or_insert_with(|| "unterminated object".to_string());
            continue;
        };
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => {}
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(last_error.map_or(FormatError::NoPayload, FormatError::Malformed))
}

/// Slice from an opening brace to its matching close, respecting strings.
fn balanced_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Compare keys ignoring case and `_` / `-`, so `est_ppl_in_line` and
/// `EstPplInLine` both match `estPplInLine`.
fn squash_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up a field under any spelling. Spellings that repeat the same
/// value are accepted; differing values make the object ambiguous.
fn field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, FormatError> {
    let wanted = squash_key(name);
    let mut found: Option<&'a Value> = None;
    for (_, value) in object.iter().filter(|(k, v)| !v.is_null() && squash_key(k) == wanted) {
        match found {
            Some(previous) if previous != value => return Err(FormatError::ConflictingField(name)),
            Some(_) => {}
            None => found = Some(value),
        }
    }
    found.ok_or(FormatError::MissingField(name))
}

/// Numbers may arrive as JSON numbers or numeric strings ("12", " 0.8 ").
fn required_number(object: &Map<String, Value>, name: &'static str) -> Result<f64, FormatError> {
    let value = field(object, name)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| FormatError::NotANumber {
            field: name,
            value: value.to_string(),
        })
}

fn required_category<T>(
    object: &Map<String, Value>,
    name: &'static str,
    from_label: impl Fn(&str) -> Option<T>,
    allowed: impl Fn() -> String,
) -> Result<T, FormatError> {
    let value = field(object, name)?;
    value
        .as_str()
        .and_then(|s| from_label(&normalize_label(s)))
        .ok_or_else(|| FormatError::UnknownCategory {
            field: name,
            value: value.as_str().map_or_else(|| value.to_string(), str::to_string),
            allowed: allowed(),
        })
}

// ============================================================================
// Tests
// ============================================================================
