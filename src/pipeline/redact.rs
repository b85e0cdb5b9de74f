//! Sensitive-field redaction.
//!
//! Strips identifying keys from a nested patient record before anything is
//! disclosed to an external service, and keeps the removed values in a
//! request-scoped ledger so the letter can be re-identified afterwards.
//!
//! Unlike the first prototype, redaction also descends into array elements
//! that are themselves mappings (e.g. a list of medication records carrying
//! a prescriber name). This is a deliberate behavior change; see DESIGN.md.

use serde_json::{Map, Value};

use super::DischargeError;

/// Key names considered identifying, matched case-insensitively at every
/// nesting level.
pub const SENSITIVE_FIELDS: &[&str] = &["name", "first_name", "last_name", "patient_id"];

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_FIELDS.iter().any(|f| key.eq_ignore_ascii_case(f))
}

/// A structural copy of a patient record with every sensitive key removed.
///
/// Only `redact` produces values of this type, so anything holding one can
/// rely on the record being safe to embed in a prompt.
#[derive(Debug, Clone)]
pub struct DeidentifiedRecord(Value);

impl DeidentifiedRecord {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Pretty JSON rendering for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

/// Values captured during redaction, held only for the duration of one run.
///
/// Never serialized, never sent to the gateway.
#[derive(Debug, Default)]
pub struct RedactionLedger {
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    patient_id: Option<String>,
    /// Dotted paths of every removed field, for the audit log.
    pub removed_fields: Vec<String>,
}

impl RedactionLedger {
    /// The patient's display name: the first `name` value seen, else
    /// first + last name joined.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }

    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    fn capture(&mut self, key: &str, value: &Value) {
        let as_text = match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        let Some(text) = as_text else { return };

        match key.to_ascii_lowercase().as_str() {
            "name" if self.name.is_none() => self.name = Some(text),
            "first_name" if self.first_name.is_none() => self.first_name = Some(text),
            "last_name" if self.last_name.is_none() => self.last_name = Some(text),
            "patient_id" if self.patient_id.is_none() => self.patient_id = Some(text),
            _ => {}
        }
    }
}

/// Remove every sensitive key from `record` at every depth.
///
/// Returns a deep copy plus the ledger of removed values; the caller's
/// record is never mutated. A non-object root cannot be traversed and is
/// rejected before any external call happens.
pub fn redact(record: &Value) -> Result<(DeidentifiedRecord, RedactionLedger), DischargeError> {
    let Value::Object(map) = record else {
        return Err(DischargeError::InvalidRecordShape {
            found: json_type_name(record),
        });
    };

    let mut ledger = RedactionLedger::default();
    let cleaned = strip_object(map, "", &mut ledger);

    tracing::debug!(
        removed = ledger.removed_fields.len(),
        "Record de-identified"
    );

    Ok((DeidentifiedRecord(Value::Object(cleaned)), ledger))
}

fn strip_object(
    map: &Map<String, Value>,
    path: &str,
    ledger: &mut RedactionLedger,
) -> Map<String, Value> {
    let mut cleaned = Map::new();
    for (key, value) in map {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };

        if is_sensitive(key) {
            ledger.capture(key, value);
            ledger.removed_fields.push(child_path);
            continue;
        }

        cleaned.insert(key.clone(), strip_value(value, &child_path, ledger));
    }
    cleaned
}

fn strip_value(value: &Value, path: &str, ledger: &mut RedactionLedger) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_object(map, path, ledger)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| strip_value(item, &format!("{path}[{i}]"), ledger))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
