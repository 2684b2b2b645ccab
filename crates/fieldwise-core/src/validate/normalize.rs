use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::schema::FieldType;
use crate::value::{FieldValue, ValidationWarning};

/// Outcome of normalizing one raw value.
///
/// Normalization never removes a value: unparsable input is kept verbatim in
/// its declared variant with a downgrade warning attached. A `None` value
/// comes out only when one went in (model-reported null) or when the input is
/// genuinely ambiguous for the type (e.g. an unrecognizable boolean).
#[derive(Debug, Clone)]
pub struct Normalized {
    pub value: Option<FieldValue>,
    pub warnings: Vec<ValidationWarning>,
}

impl Normalized {
    fn clean(value: FieldValue) -> Self {
        Self {
            value: Some(value),
            warnings: Vec::new(),
        }
    }

    fn with_warning(value: Option<FieldValue>, warning: ValidationWarning) -> Self {
        Self {
            value,
            warnings: vec![warning],
        }
    }
}

/// Normalize a raw value for its declared type.
///
/// Idempotent: re-applying any normalizer to its own output is a no-op on the
/// value (warnings describing the original input are naturally not re-emitted
/// for already-canonical input).
#[must_use]
pub fn normalize(field_path: &str, field_type: FieldType, raw: &serde_json::Value) -> Normalized {
    if raw.is_null() {
        // A model-reported null is never replaced with a default.
        return Normalized {
            value: None,
            warnings: Vec::new(),
        };
    }

    match field_type {
        FieldType::Date => normalize_date(field_path, &text_of(raw)),
        FieldType::Currency => normalize_currency(field_path, &text_of(raw)),
        FieldType::Number => normalize_number(field_path, &text_of(raw)),
        FieldType::Area => normalize_area(field_path, &text_of(raw)),
        FieldType::Percentage => normalize_percentage(field_path, &text_of(raw)),
        FieldType::Boolean => normalize_boolean(field_path, raw),
        FieldType::Address => normalize_address(field_path, &text_of(raw)),
        FieldType::Text => normalize_text(field_path, &text_of(raw)),
        FieldType::List => normalize_list(raw),
    }
}

fn text_of(raw: &serde_json::Value) -> String {
    match raw {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%Y%m%d",
];

fn normalize_date(field_path: &str, input: &str) -> Normalized {
    // Already canonical ISO-8601.
    if NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok() {
        return Normalized::clean(FieldValue::Date(input.to_string()));
    }

    // Strip ordinal suffixes: "March 1st, 2024" -> "March 1, 2024".
    let cleaned = ORDINALS.replace_all(input, "$1");

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            let iso = date.format("%Y-%m-%d").to_string();
            return Normalized::with_warning(
                Some(FieldValue::Date(iso.clone())),
                ValidationWarning::info(
                    field_path,
                    format!("date format normalized from '{input}' to '{iso}'"),
                ),
            );
        }
    }

    // Unparsable: keep the raw text, lower confidence.
    Normalized::with_warning(
        Some(FieldValue::Date(input.to_string())),
        ValidationWarning::downgrade(field_path, format!("could not parse date: {input}")),
    )
}

fn normalize_currency(field_path: &str, input: &str) -> Normalized {
    let cleaned = CURRENCY_SYMBOLS.replace_all(input, "");

    let Ok(amount) = cleaned.trim().parse::<f64>() else {
        return Normalized::with_warning(
            Some(FieldValue::Currency(input.to_string())),
            ValidationWarning::downgrade(field_path, format!("could not parse currency: {input}")),
        );
    };

    let canonical = format!("{amount:.2}");
    let mut warnings = Vec::new();

    if amount < 0.0 {
        // Negative amounts can be valid (credits), so informational only.
        warnings.push(ValidationWarning::info(
            field_path,
            format!("negative currency value: {canonical}"),
        ));
    }
    if amount > 100_000_000.0 {
        warnings.push(ValidationWarning::info(
            field_path,
            format!("unusually large currency value: {canonical}"),
        ));
    }

    Normalized {
        value: Some(FieldValue::Currency(canonical)),
        warnings,
    }
}

fn strip_number(input: &str) -> Option<f64> {
    input.replace(',', "").trim().parse().ok()
}

fn normalize_number(field_path: &str, input: &str) -> Normalized {
    let mut warnings = Vec::new();

    let parsed = strip_number(input).or_else(|| {
        // "60 months", "40 spaces": a bare number trailed by a unit word.
        let stripped = NUMBER_UNIT
            .captures(input)
            .and_then(|caps| strip_number(caps.get(1).map_or("", |m| m.as_str())));
        if stripped.is_some() {
            warnings.push(ValidationWarning::info(
                field_path,
                format!("unit suffix stripped from '{input}'"),
            ));
        }
        stripped
    });

    let Some(number) = parsed else {
        return Normalized::with_warning(
            Some(FieldValue::Text(input.to_string())),
            ValidationWarning::downgrade(field_path, format!("could not parse number: {input}")),
        );
    };
    if field_path.contains("month") && !(0.0..=1200.0).contains(&number) {
        warnings.push(ValidationWarning::info(
            field_path,
            format!("unusual month value: {number}"),
        ));
    }

    Normalized {
        value: Some(FieldValue::Number(number)),
        warnings,
    }
}

fn normalize_area(field_path: &str, input: &str) -> Normalized {
    let cleaned = AREA_UNITS.replace_all(input, "").replace(',', "");

    let Ok(area) = cleaned.trim().parse::<f64>() else {
        return Normalized::with_warning(
            Some(FieldValue::Area(input.to_string())),
            ValidationWarning::downgrade(field_path, format!("could not parse area: {input}")),
        );
    };

    let mut warnings = Vec::new();
    if area < 0.0 {
        // Nonsensical but not a rejection.
        warnings.push(ValidationWarning::downgrade(
            field_path,
            format!("negative area: {area}"),
        ));
    } else if area < 10.0 {
        warnings.push(ValidationWarning::info(
            field_path,
            format!("suspiciously small area: {area} SF"),
        ));
    } else if area > 10_000_000.0 {
        warnings.push(ValidationWarning::info(
            field_path,
            format!("very large area: {area} SF"),
        ));
    }

    // f64 Display already drops a zero fraction: 5000.0 renders as "5000".
    Normalized {
        value: Some(FieldValue::Area(format!("{area}"))),
        warnings,
    }
}

fn normalize_percentage(field_path: &str, input: &str) -> Normalized {
    let Some(mut pct) = strip_number(&input.replace('%', "")) else {
        return Normalized::with_warning(
            Some(FieldValue::Text(input.to_string())),
            ValidationWarning::downgrade(
                field_path,
                format!("could not parse percentage: {input}"),
            ),
        );
    };

    let mut warnings = Vec::new();

    // Percent-scaled input converts to a decimal fraction. Values above 100
    // stay untouched (re-dividing would make the conversion unstable) and
    // are flagged instead.
    if pct > 1.0 && pct <= 100.0 {
        let converted = (pct / 100.0 * 10_000.0).round() / 10_000.0;
        warnings.push(ValidationWarning::info(
            field_path,
            format!("percentage converted from {input} to {converted}"),
        ));
        pct = converted;
    } else if !(0.0..=1.0).contains(&pct) {
        warnings.push(ValidationWarning::downgrade(
            field_path,
            format!("percentage {pct} outside valid range [0, 1]"),
        ));
    } else {
        pct = (pct * 10_000.0).round() / 10_000.0;
    }

    Normalized {
        value: Some(FieldValue::Percentage(pct)),
        warnings,
    }
}

fn normalize_boolean(field_path: &str, raw: &serde_json::Value) -> Normalized {
    if let serde_json::Value::Bool(b) = raw {
        return Normalized::clean(FieldValue::Boolean(*b));
    }

    let text = text_of(raw).to_lowercase();
    match text.as_str() {
        "true" | "t" | "yes" | "y" | "1" | "affirmed" => {
            Normalized::clean(FieldValue::Boolean(true))
        }
        "false" | "f" | "no" | "n" | "0" | "denied" => {
            Normalized::clean(FieldValue::Boolean(false))
        }
        other => Normalized::with_warning(
            None,
            ValidationWarning::downgrade(field_path, format!("could not parse boolean: {other}")),
        ),
    }
}

fn normalize_address(field_path: &str, input: &str) -> Normalized {
    let trimmed = input.trim().to_string();
    let mut warnings = Vec::new();

    if SUITE.is_match(&trimmed) && !field_path.contains("suite") {
        warnings.push(ValidationWarning::info(
            field_path,
            "suite/unit found in address; consider extracting separately",
        ));
    }

    if !STREET_NUMBER.is_match(&trimmed) {
        warnings.push(ValidationWarning::info(field_path, "address missing street number"));
    }
    if !STATE_ABBREV.is_match(&trimmed) {
        warnings.push(ValidationWarning::info(
            field_path,
            "address missing state abbreviation",
        ));
    }
    if !ZIP.is_match(&trimmed) {
        warnings.push(ValidationWarning::info(field_path, "address missing ZIP code"));
    }

    // Well-formed input is never altered.
    Normalized {
        value: Some(FieldValue::Address(trimmed)),
        warnings,
    }
}

fn normalize_text(field_path: &str, input: &str) -> Normalized {
    let trimmed = input.trim().to_string();

    if trimmed.len() < 2 && field_path.contains("name") {
        return Normalized::with_warning(
            Some(FieldValue::Text(trimmed.clone())),
            ValidationWarning::info(
                field_path,
                format!("suspiciously short value: '{trimmed}'"),
            ),
        );
    }

    Normalized::clean(FieldValue::Text(trimmed))
}

fn normalize_list(raw: &serde_json::Value) -> Normalized {
    let items = match raw {
        serde_json::Value::Array(values) => values
            .iter()
            .map(|v| text_of(v).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        other => vec![text_of(other)],
    };
    Normalized::clean(FieldValue::List(items))
}

macro_rules! static_regex {
    ($name:ident, $pattern:literal) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("static pattern"));
    };
}

static_regex!(ORDINALS, r"(\d+)(st|nd|rd|th)");
static_regex!(
    NUMBER_UNIT,
    r"(?i)^\s*(-?\d[\d,]*\.?\d*)\s*(months?|mos?\.?|years?|yrs?\.?|days?|spaces?)\s*$"
);
static_regex!(CURRENCY_SYMBOLS, r"[$,€£¥]");
static_regex!(AREA_UNITS, r"(?i)\s*(square\s+feet|sq\.?\s*ft\.?|rsf|usf|sf)");
static_regex!(SUITE, r"(?i)(suite|ste\.?|unit|#)\s*[\w-]+");
static_regex!(STREET_NUMBER, r"\b\d+\b");
static_regex!(STATE_ABBREV, r"\b[A-Z]{2}\b");
static_regex!(ZIP, r"\b\d{5}(-\d{4})?\b");
