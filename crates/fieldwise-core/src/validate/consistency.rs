use crate::value::{ExtractionResult, Severity, ValidationWarning};

/// Average days per month, used to compare stated term length against the
/// commencement/expiration span.
const DAYS_PER_MONTH: f64 = 30.44;

/// A rule over the whole extraction result relating two or more fields.
///
/// Rules are pure and independent: each declares the fields it reads and
/// produces zero or more warnings. Adding a rule never requires touching
/// another.
pub trait ConsistencyRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Field paths this rule reads.
    fn fields(&self) -> &'static [&'static str];

    fn severity(&self) -> Severity {
        Severity::Downgrade
    }

    fn check(&self, result: &ExtractionResult, tolerance: f64) -> Vec<ValidationWarning>;
}

/// Runs every registered rule after per-field normalization.
pub struct ConsistencyEngine {
    rules: Vec<Box<dyn ConsistencyRule>>,
    tolerance: f64,
}

impl ConsistencyEngine {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            rules: Vec::new(),
            tolerance,
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Box<dyn ConsistencyRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// The standard lease rule set.
    #[must_use]
    pub fn standard(tolerance: f64) -> Self {
        Self::new(tolerance)
            .with_rule(Box::new(DateOrder))
            .with_rule(Box::new(AnnualMatchesMonthly))
            .with_rule(Box::new(UsableWithinRentable))
            .with_rule(Box::new(TermMatchesDateSpan))
            .with_rule(Box::new(RentPerSquareFoot))
    }

    #[must_use]
    pub fn check_all(&self, result: &ExtractionResult) -> Vec<ValidationWarning> {
        self.rules
            .iter()
            .flat_map(|rule| rule.check(result, self.tolerance))
            .collect()
    }
}

fn numeric(result: &ExtractionResult, path: &str) -> Option<f64> {
    result
        .get(path)
        .and_then(|v| v.normalized_value.as_ref())
        .and_then(crate::value::FieldValue::as_f64)
}

fn date(result: &ExtractionResult, path: &str) -> Option<chrono::NaiveDate> {
    result
        .get(path)
        .and_then(|v| v.normalized_value.as_ref())
        .and_then(crate::value::FieldValue::as_date)
}

fn relative_difference(actual: f64, expected: f64) -> Option<f64> {
    if expected == 0.0 {
        return None;
    }
    Some((actual - expected).abs() / expected.abs())
}

/// Expiration must fall after commencement.
pub struct DateOrder;

impl ConsistencyRule for DateOrder {
    fn name(&self) -> &'static str {
        "date_order"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["dates.commencement_date", "dates.expiration_date"]
    }

    fn check(&self, result: &ExtractionResult, _tolerance: f64) -> Vec<ValidationWarning> {
        let (Some(commencement), Some(expiration)) = (
            date(result, "dates.commencement_date"),
            date(result, "dates.expiration_date"),
        ) else {
            return Vec::new();
        };

        if expiration <= commencement {
            return vec![ValidationWarning::downgrade(
                "dates.expiration_date",
                format!(
                    "expiration date {expiration} should be after commencement date {commencement}"
                ),
            )];
        }
        Vec::new()
    }
}

/// Annual rent should be monthly rent times twelve, within tolerance.
pub struct AnnualMatchesMonthly;

impl ConsistencyRule for AnnualMatchesMonthly {
    fn name(&self) -> &'static str {
        "annual_matches_monthly"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["rent.base_rent_monthly", "rent.base_rent_annual"]
    }

    fn check(&self, result: &ExtractionResult, tolerance: f64) -> Vec<ValidationWarning> {
        let (Some(monthly), Some(annual)) = (
            numeric(result, "rent.base_rent_monthly"),
            numeric(result, "rent.base_rent_annual"),
        ) else {
            return Vec::new();
        };

        let expected = monthly * 12.0;
        match relative_difference(annual, expected) {
            Some(diff) if diff > tolerance => vec![ValidationWarning::downgrade(
                "rent.base_rent_annual",
                format!(
                    "annual rent {annual:.2} does not match monthly {monthly:.2} x 12 = {expected:.2}"
                ),
            )],
            _ => Vec::new(),
        }
    }
}

/// Usable square footage cannot exceed rentable square footage.
pub struct UsableWithinRentable;

impl ConsistencyRule for UsableWithinRentable {
    fn name(&self) -> &'static str {
        "usable_within_rentable"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["property.usable_area", "property.rentable_area"]
    }

    fn check(&self, result: &ExtractionResult, _tolerance: f64) -> Vec<ValidationWarning> {
        let (Some(usable), Some(rentable)) = (
            numeric(result, "property.usable_area"),
            numeric(result, "property.rentable_area"),
        ) else {
            return Vec::new();
        };

        if usable > rentable {
            return vec![ValidationWarning::downgrade(
                "property.usable_area",
                format!("usable area {usable} greater than rentable area {rentable}"),
            )];
        }
        Vec::new()
    }
}

/// Stated term length should match the commencement/expiration span to
/// within one month.
pub struct TermMatchesDateSpan;

impl ConsistencyRule for TermMatchesDateSpan {
    fn name(&self) -> &'static str {
        "term_matches_date_span"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "dates.lease_term_months",
            "dates.commencement_date",
            "dates.expiration_date",
        ]
    }

    fn check(&self, result: &ExtractionResult, _tolerance: f64) -> Vec<ValidationWarning> {
        let (Some(stated), Some(commencement), Some(expiration)) = (
            numeric(result, "dates.lease_term_months"),
            date(result, "dates.commencement_date"),
            date(result, "dates.expiration_date"),
        ) else {
            return Vec::new();
        };

        let days = (expiration - commencement).num_days() as f64;
        let calculated = days / DAYS_PER_MONTH;

        if (calculated - stated).abs() > 1.0 {
            return vec![ValidationWarning::downgrade(
                "dates.lease_term_months",
                format!(
                    "stated term ({stated} months) differs from calculated term \
                     ({calculated:.1} months) based on dates"
                ),
            )];
        }
        Vec::new()
    }
}

/// Rent per square foot should equal annual rent over rentable area.
pub struct RentPerSquareFoot;

impl ConsistencyRule for RentPerSquareFoot {
    fn name(&self) -> &'static str {
        "rent_per_square_foot"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "rent.rent_per_sf_annual",
            "rent.base_rent_annual",
            "property.rentable_area",
        ]
    }

    fn check(&self, result: &ExtractionResult, tolerance: f64) -> Vec<ValidationWarning> {
        let (Some(per_sf), Some(annual), Some(area)) = (
            numeric(result, "rent.rent_per_sf_annual"),
            numeric(result, "rent.base_rent_annual"),
            numeric(result, "property.rentable_area"),
        ) else {
            return Vec::new();
        };
        if area == 0.0 {
            return Vec::new();
        }

        let expected = annual / area;
        match relative_difference(per_sf, expected) {
            Some(diff) if diff > tolerance => vec![ValidationWarning::downgrade(
                "rent.rent_per_sf_annual",
                format!("rent/SF {per_sf:.2} does not match annual rent / area = {expected:.2}"),
            )],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ExtractedValue, FieldValue};

    fn insert(result: &mut ExtractionResult, path: &str, value: FieldValue) {
        result.insert(ExtractedValue::new(
            path,
            serde_json::Value::Null,
            Some(value),
            0.9,
        ));
    }

    fn engine() -> ConsistencyEngine {
        ConsistencyEngine::standard(0.05)
    }

    #[test]
    fn test_date_order_violation() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "dates.commencement_date", FieldValue::Date("2024-01-01".into()));
        insert(&mut result, "dates.expiration_date", FieldValue::Date("2023-12-31".into()));

        let warnings = engine().check_all(&result);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field_path, "dates.expiration_date");
        assert!(warnings[0].message.contains("after commencement"));
    }

    #[test]
    fn test_date_order_ok() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "dates.commencement_date", FieldValue::Date("2024-01-01".into()));
        insert(&mut result, "dates.expiration_date", FieldValue::Date("2028-12-31".into()));

        assert!(engine().check_all(&result).is_empty());
    }

    #[test]
    fn test_annual_monthly_within_tolerance() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "rent.base_rent_monthly", FieldValue::Currency("15000.00".into()));
        insert(&mut result, "rent.base_rent_annual", FieldValue::Currency("180000.00".into()));

        assert!(engine().check_all(&result).is_empty());
    }

    #[test]
    fn test_annual_monthly_mismatch() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "rent.base_rent_monthly", FieldValue::Currency("15000.00".into()));
        insert(&mut result, "rent.base_rent_annual", FieldValue::Currency("200000.00".into()));

        let warnings = engine().check_all(&result);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field_path, "rent.base_rent_annual");
    }

    #[test]
    fn test_usable_exceeds_rentable() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "property.usable_area", FieldValue::Area("6000".into()));
        insert(&mut result, "property.rentable_area", FieldValue::Area("5000".into()));

        let warnings = engine().check_all(&result);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field_path, "property.usable_area");
    }

    #[test]
    fn test_term_span_consistency() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "dates.commencement_date", FieldValue::Date("2024-01-01".into()));
        insert(&mut result, "dates.expiration_date", FieldValue::Date("2028-12-31".into()));
        insert(&mut result, "dates.lease_term_months", FieldValue::Number(60.0));

        assert!(engine().check_all(&result).is_empty());

        insert(&mut result, "dates.lease_term_months", FieldValue::Number(36.0));
        let warnings = engine().check_all(&result);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field_path, "dates.lease_term_months");
    }

    #[test]
    fn test_rent_per_sf() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "rent.base_rent_annual", FieldValue::Currency("180000.00".into()));
        insert(&mut result, "property.rentable_area", FieldValue::Area("5000".into()));
        insert(&mut result, "rent.rent_per_sf_annual", FieldValue::Currency("36.00".into()));

        assert!(engine().check_all(&result).is_empty());

        insert(&mut result, "rent.rent_per_sf_annual", FieldValue::Currency("50.00".into()));
        let warnings = engine().check_all(&result);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_missing_fields_produce_no_warnings() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "rent.base_rent_monthly", FieldValue::Currency("15000.00".into()));

        assert!(engine().check_all(&result).is_empty());
    }

    #[test]
    fn test_rules_declare_their_fields() {
        for rule in [
            Box::new(DateOrder) as Box<dyn ConsistencyRule>,
            Box::new(AnnualMatchesMonthly),
            Box::new(UsableWithinRentable),
            Box::new(TermMatchesDateSpan),
            Box::new(RentPerSquareFoot),
        ] {
            assert!(!rule.fields().is_empty(), "{} declares no fields", rule.name());
        }
    }

    #[test]
    fn test_unparsed_date_value_is_skipped() {
        let mut result = ExtractionResult::new();
        insert(&mut result, "dates.commencement_date", FieldValue::Date("upon completion".into()));
        insert(&mut result, "dates.expiration_date", FieldValue::Date("2023-12-31".into()));

        // A raw, unparsable date never trips the order rule.
        assert!(engine().check_all(&result).is_empty());
    }
}
