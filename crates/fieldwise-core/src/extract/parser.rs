use thiserror::Error;

use super::model::{ModelResponse, RawFieldResult};
use crate::schema::{FieldSchema, FieldType};
use crate::value::{ExtractedValue, ExtractionResult, FieldValue};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Response contained no extractable fields")]
    EmptyResponse,
    #[error("Field {path}: expected {expected} value, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: String,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Convert a structured model response into a pre-validation
/// [`ExtractionResult`] skeleton.
///
/// Every schema field gets an entry: fields the model omitted or reported as
/// null become absent values (null, confidence 0.0, no citation, no warning).
/// Non-null values are mapped into the tagged variant for their declared type
/// here, at the boundary; nothing loosely typed travels further.
pub fn parse(response: &ModelResponse, schema: &FieldSchema) -> ParseResult<ExtractionResult> {
    if response.fields.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let mut result = ExtractionResult::new();

    for field in schema.fields() {
        let entry = match response.fields.get(&field.path) {
            Some(raw) if !raw.value.is_null() => typed_entry(&field.path, field.field_type, raw)?,
            Some(raw) => {
                // Model-reported null: genuinely absent, ambiguous, or
                // contradictory. Keep the reasoning, drop everything else.
                ExtractedValue::absent(&field.path).with_reasoning(raw.reasoning.clone())
            }
            None => ExtractedValue::absent(&field.path),
        };
        result.insert(entry);
    }

    Ok(result)
}

fn typed_entry(
    path: &str,
    field_type: FieldType,
    raw: &RawFieldResult,
) -> ParseResult<ExtractedValue> {
    let candidate = map_value(path, field_type, &raw.value)?;

    let mut entry = ExtractedValue::new(path, raw.value.clone(), Some(candidate), raw.confidence)
        .with_reasoning(raw.reasoning.clone());
    if let Some(citation) = &raw.citation {
        entry = entry.with_citation(citation.clone());
    }
    Ok(entry)
}

/// Map an untyped JSON value into the declared field type's variant.
///
/// String-backed variants keep the model's text verbatim; canonical
/// formatting is the validation engine's job.
fn map_value(
    path: &str,
    field_type: FieldType,
    value: &serde_json::Value,
) -> ParseResult<FieldValue> {
    use serde_json::Value;

    let mismatch = |expected: &'static str| ParseError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: value.to_string(),
    };

    match field_type {
        FieldType::Text => scalar_text(value).map(FieldValue::Text).ok_or_else(|| mismatch("text")),
        FieldType::Address => scalar_text(value)
            .map(FieldValue::Address)
            .ok_or_else(|| mismatch("address")),
        FieldType::Date => scalar_text(value).map(FieldValue::Date).ok_or_else(|| mismatch("date")),
        FieldType::Currency => scalar_text(value)
            .map(FieldValue::Currency)
            .ok_or_else(|| mismatch("currency")),
        FieldType::Area => scalar_text(value).map(FieldValue::Area).ok_or_else(|| mismatch("area")),
        FieldType::Number => match value {
            Value::Number(n) => n.as_f64().map(FieldValue::Number).ok_or_else(|| mismatch("number")),
            Value::String(s) => Ok(FieldValue::Text(s.trim().to_string())),
            _ => Err(mismatch("number")),
        },
        FieldType::Percentage => match value {
            Value::Number(n) => {
                n.as_f64().map(FieldValue::Percentage).ok_or_else(|| mismatch("percentage"))
            }
            Value::String(s) => Ok(FieldValue::Text(s.trim().to_string())),
            _ => Err(mismatch("percentage")),
        },
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
            Value::String(s) => Ok(FieldValue::Text(s.trim().to_string())),
            _ => Err(mismatch("boolean")),
        },
        FieldType::List => match value {
            Value::Array(items) => Ok(FieldValue::List(
                items.iter().filter_map(scalar_text).collect(),
            )),
            Value::String(s) => Ok(FieldValue::List(vec![s.trim().to_string()])),
            _ => Err(mismatch("list")),
        },
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
