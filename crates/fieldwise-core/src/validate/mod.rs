mod consistency;
mod normalize;

pub use consistency::{
    AnnualMatchesMonthly, ConsistencyEngine, ConsistencyRule, DateOrder, RentPerSquareFoot,
    TermMatchesDateSpan, UsableWithinRentable,
};
pub use normalize::{normalize, Normalized};

use crate::schema::FieldSchema;
use crate::value::ExtractionResult;

/// Per-field normalization followed by cross-field consistency checks.
///
/// Warnings annotate, never remove: every value that enters validation leaves
/// it, possibly canonicalized and possibly with lowered confidence.
pub struct ValidationEngine {
    consistency: ConsistencyEngine,
}

impl ValidationEngine {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            consistency: ConsistencyEngine::standard(tolerance),
        }
    }

    #[must_use]
    pub fn with_consistency(consistency: ConsistencyEngine) -> Self {
        Self { consistency }
    }

    /// Normalize every present value in place, then run the cross-field
    /// rules over the normalized result.
    pub fn run(&self, result: &mut ExtractionResult, schema: &FieldSchema) {
        let mut warnings = Vec::new();

        for field in schema.fields() {
            let Some(entry) = result.values.get_mut(&field.path) else {
                continue;
            };
            if entry.raw_value.is_null() {
                continue;
            }

            let normalized = normalize(&field.path, field.field_type, &entry.raw_value);
            entry.normalized_value = normalized.value;
            warnings.extend(normalized.warnings);
        }

        for warning in warnings {
            result.add_warning(warning);
        }

        for warning in self.consistency.check_all(result) {
            result.add_warning(warning);
        }
    }
}
