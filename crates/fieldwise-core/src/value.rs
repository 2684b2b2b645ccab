use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence penalty applied when a downgrade-severity warning attaches to
/// a value. Floored at zero.
pub const WARNING_PENALTY: f64 = 0.1;

/// A typed, normalized field value.
///
/// Untyped model output is mapped into one of these variants exactly once, at
/// the response-parsing boundary; nothing loosely typed travels further into
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    /// ISO-8601 `YYYY-MM-DD` when parsable; raw input otherwise (with a
    /// warning attached by the validator).
    Date(String),
    /// Unscaled decimal string with exactly two fractional digits.
    Currency(String),
    Boolean(bool),
    /// Decimal fraction: `0.05`, never `"5%"`.
    Percentage(f64),
    /// Bare numeric string, unit suffixes stripped.
    Area(String),
    Address(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Numeric view used by cross-field consistency rules.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) | Self::Percentage(n) => Some(*n),
            Self::Currency(s) | Self::Area(s) => s.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Date(s) | Self::Currency(s) | Self::Area(s)
            | Self::Address(s) => Some(s),
            _ => None,
        }
    }
}

/// Provenance pointer into the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    pub quote: String,
}

impl Citation {
    #[must_use]
    pub fn new(page: u32, quote: impl Into<String>) -> Self {
        Self {
            page,
            quote: quote.into(),
        }
    }
}

/// One extracted field with confidence and provenance.
///
/// `normalized_value` is `None` only when the field is genuinely absent,
/// ambiguous, or contradictory in the source. It is never a substituted
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedValue {
    pub field_path: String,
    /// The model's verbatim output for this field.
    pub raw_value: serde_json::Value,
    pub normalized_value: Option<FieldValue>,
    pub confidence: f64,
    pub reasoning: String,
    pub citation: Option<Citation>,
}

impl ExtractedValue {
    #[must_use]
    pub fn new(
        field_path: impl Into<String>,
        raw_value: serde_json::Value,
        normalized_value: Option<FieldValue>,
        confidence: f64,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            raw_value,
            normalized_value,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: String::new(),
            citation: None,
        }
    }

    /// A field the document never mentions: null value, zero confidence,
    /// no citation.
    #[must_use]
    pub fn absent(field_path: impl Into<String>) -> Self {
        Self::new(field_path, serde_json::Value::Null, None, 0.0)
    }

    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    #[must_use]
    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = Some(citation);
        self
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence.clamp(0.0, 1.0);
    }

    /// Lower confidence by the fixed warning penalty, floored at zero.
    pub fn apply_penalty(&mut self) {
        self.confidence = (self.confidence - WARNING_PENALTY).max(0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only; confidence is untouched.
    Info,
    /// Confidence is reduced by the fixed penalty.
    Downgrade,
}

/// Attached during validation. Never removes or blocks a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field_path: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationWarning {
    #[must_use]
    pub fn info(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    #[must_use]
    pub fn downgrade(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
            severity: Severity::Downgrade,
        }
    }
}

/// Confidence before and after refinement for one considered field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceDelta {
    pub before: f64,
    pub after: f64,
}

/// Usage, timing, and refinement bookkeeping for one extraction request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
    pub elapsed_ms: u64,
    pub refined_fields: Vec<String>,
    pub refinement_improvements: BTreeMap<String, ConfidenceDelta>,
}

/// The complete output of one extraction request. Created empty, populated
/// by the parser, annotated by validation, selectively overwritten by
/// refinement, then handed immutably to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub values: BTreeMap<String, ExtractedValue>,
    pub warnings: Vec<ValidationWarning>,
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, field_path: &str) -> Option<&ExtractedValue> {
        self.values.get(field_path)
    }

    pub fn insert(&mut self, value: ExtractedValue) {
        self.values.insert(value.field_path.clone(), value);
    }

    /// Attach a warning, applying the confidence penalty for downgrades.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        if warning.severity == Severity::Downgrade {
            if let Some(value) = self.values.get_mut(&warning.field_path) {
                value.apply_penalty();
            }
        }
        self.warnings.push(warning);
    }

    #[must_use]
    pub fn warnings_for(&self, field_path: &str) -> Vec<&ValidationWarning> {
        self.warnings
            .iter()
            .filter(|w| w.field_path == field_path)
            .collect()
    }
}
