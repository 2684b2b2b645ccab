use serde::{Deserialize, Serialize};

/// Data type of an extracted field, driving normalization and prompt guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Currency,
    Boolean,
    Percentage,
    /// Square footage, acreage, and similar measures.
    Area,
    Address,
    /// Multiple values for one field.
    List,
}

impl FieldType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Currency => "currency",
            Self::Boolean => "boolean",
            Self::Percentage => "percentage",
            Self::Area => "area",
            Self::Address => "address",
            Self::List => "list",
        }
    }
}

/// Categories used to group fields in prompts and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    BasicInfo,
    Parties,
    Property,
    DatesTerm,
    Rent,
    OperatingExpenses,
    Financial,
    RightsOptions,
    UseRestrictions,
    Maintenance,
    Insurance,
    Other,
}

impl FieldCategory {
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::BasicInfo => "Basic Info",
            Self::Parties => "Parties",
            Self::Property => "Property",
            Self::DatesTerm => "Dates and Term",
            Self::Rent => "Rent",
            Self::OperatingExpenses => "Operating Expenses",
            Self::Financial => "Financial",
            Self::RightsOptions => "Rights and Options",
            Self::UseRestrictions => "Use Restrictions",
            Self::Maintenance => "Maintenance",
            Self::Insurance => "Insurance",
            Self::Other => "Other",
        }
    }
}

/// One field the pipeline is asked to extract.
///
/// Definitions are immutable: the schema is loaded once per deployment and
/// never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Dot-scoped unique identifier, e.g. `rent.base_rent_monthly`.
    pub path: String,
    pub label: String,
    pub category: FieldCategory,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
}

impl FieldDefinition {
    #[must_use]
    pub fn new(
        path: &str,
        label: &str,
        category: FieldCategory,
        field_type: FieldType,
        description: &str,
        required: bool,
    ) -> Self {
        Self {
            path: path.to_string(),
            label: label.to_string(),
            category,
            field_type,
            description: description.to_string(),
            required,
        }
    }
}

/// Declarative catalogue of fields to extract. Pure read access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    fields: Vec<FieldDefinition>,
}

impl FieldSchema {
    #[must_use]
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    #[must_use]
    pub fn by_path(&self, path: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.path == path)
    }

    #[must_use]
    pub fn by_category(&self, category: FieldCategory) -> Vec<&FieldDefinition> {
        self.fields.iter().filter(|f| f.category == category).collect()
    }

    #[must_use]
    pub fn required_fields(&self) -> Vec<&FieldDefinition> {
        self.fields.iter().filter(|f| f.required).collect()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.path.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the fields whose paths appear in `paths`, preserving order.
    #[must_use]
    pub fn subset(&self, paths: &[String]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| paths.iter().any(|p| *p == f.path))
                .cloned()
                .collect(),
        }
    }

    /// Render the schema as the category-grouped block embedded in prompts.
    #[must_use]
    pub fn prompt_block(&self) -> String {
        let mut out = String::new();
        let mut seen: Vec<FieldCategory> = Vec::new();

        for field in &self.fields {
            if !seen.contains(&field.category) {
                seen.push(field.category);
            }
        }

        for category in seen {
            out.push_str(&format!("\n## {}\n", category.title()));
            for field in self.fields.iter().filter(|f| f.category == category) {
                let required = if field.required { " (REQUIRED)" } else { "" };
                out.push_str(&format!(
                    "- {} [{}]: {}{}\n",
                    field.path,
                    field.field_type.as_str(),
                    field.description,
                    required
                ));
            }
        }

        out
    }

    /// The built-in commercial lease abstraction schema.
    #[must_use]
    pub fn lease() -> Self {
        use FieldCategory as C;
        use FieldType as T;

        Self::new(vec![
            FieldDefinition::new(
                "basic_info.lease_type",
                "Lease Type",
                C::BasicInfo,
                T::Text,
                "Type of lease (e.g., Office, Retail, Industrial, Ground)",
                true,
            ),
            FieldDefinition::new(
                "basic_info.execution_date",
                "Execution Date",
                C::BasicInfo,
                T::Date,
                "Date the lease was executed/signed",
                true,
            ),
            FieldDefinition::new(
                "parties.landlord_name",
                "Landlord Name",
                C::Parties,
                T::Text,
                "Full legal name of the landlord/lessor",
                true,
            ),
            FieldDefinition::new(
                "parties.landlord_address",
                "Landlord Address",
                C::Parties,
                T::Address,
                "Mailing address of the landlord",
                false,
            ),
            FieldDefinition::new(
                "parties.tenant_name",
                "Tenant Name",
                C::Parties,
                T::Text,
                "Full legal name of the tenant/lessee",
                true,
            ),
            FieldDefinition::new(
                "parties.tenant_address",
                "Tenant Address",
                C::Parties,
                T::Address,
                "Mailing address of the tenant",
                false,
            ),
            FieldDefinition::new(
                "property.address",
                "Property Address",
                C::Property,
                T::Address,
                "Full street address of the leased property",
                true,
            ),
            FieldDefinition::new(
                "property.suite_unit",
                "Suite/Unit Number",
                C::Property,
                T::Text,
                "Specific suite or unit number if applicable",
                false,
            ),
            FieldDefinition::new(
                "property.rentable_area",
                "Rentable Square Feet",
                C::Property,
                T::Area,
                "Rentable square footage of the premises",
                true,
            ),
            FieldDefinition::new(
                "property.usable_area",
                "Usable Square Feet",
                C::Property,
                T::Area,
                "Usable square footage of the premises",
                false,
            ),
            FieldDefinition::new(
                "dates.commencement_date",
                "Commencement Date",
                C::DatesTerm,
                T::Date,
                "Date when the lease term begins",
                true,
            ),
            FieldDefinition::new(
                "dates.expiration_date",
                "Expiration Date",
                C::DatesTerm,
                T::Date,
                "Date when the lease term ends",
                true,
            ),
            FieldDefinition::new(
                "dates.rent_commencement_date",
                "Rent Commencement Date",
                C::DatesTerm,
                T::Date,
                "Date when rent payments begin (may differ from lease commencement)",
                false,
            ),
            FieldDefinition::new(
                "dates.lease_term_months",
                "Lease Term (Months)",
                C::DatesTerm,
                T::Number,
                "Total length of the lease term in months",
                true,
            ),
            FieldDefinition::new(
                "rent.base_rent_monthly",
                "Base Rent (Monthly)",
                C::Rent,
                T::Currency,
                "Monthly base rent amount",
                true,
            ),
            FieldDefinition::new(
                "rent.base_rent_annual",
                "Base Rent (Annual)",
                C::Rent,
                T::Currency,
                "Annual base rent amount",
                false,
            ),
            FieldDefinition::new(
                "rent.rent_per_sf_annual",
                "Rent per SF (Annual)",
                C::Rent,
                T::Currency,
                "Annual rent per square foot",
                false,
            ),
            FieldDefinition::new(
                "rent.rent_escalations",
                "Rent Escalations",
                C::Rent,
                T::Text,
                "Description of rent increase schedule or formula",
                false,
            ),
            FieldDefinition::new(
                "rent.free_rent_months",
                "Free Rent Period (Months)",
                C::Rent,
                T::Number,
                "Number of months of free rent, if any",
                false,
            ),
            FieldDefinition::new(
                "operating_expenses.structure_type",
                "Operating Expense Structure",
                C::OperatingExpenses,
                T::Text,
                "Type of operating expense structure (e.g., NNN, Gross, Modified Gross)",
                false,
            ),
            FieldDefinition::new(
                "operating_expenses.base_year",
                "Base Year for Operating Expenses",
                C::OperatingExpenses,
                T::Text,
                "Base year for calculating operating expense increases",
                false,
            ),
            FieldDefinition::new(
                "operating_expenses.tenant_share_percentage",
                "Tenant's Share Percentage",
                C::OperatingExpenses,
                T::Percentage,
                "Tenant's proportionate share of operating expenses",
                false,
            ),
            FieldDefinition::new(
                "financial.security_deposit",
                "Security Deposit",
                C::Financial,
                T::Currency,
                "Amount of security deposit required",
                false,
            ),
            FieldDefinition::new(
                "financial.tenant_improvement_allowance",
                "Tenant Improvement Allowance",
                C::Financial,
                T::Currency,
                "Amount landlord will contribute for tenant improvements",
                false,
            ),
            FieldDefinition::new(
                "rights.renewal_options",
                "Renewal Options",
                C::RightsOptions,
                T::Text,
                "Description of renewal option terms",
                false,
            ),
            FieldDefinition::new(
                "rights.termination_rights",
                "Termination Rights",
                C::RightsOptions,
                T::Text,
                "Any early termination rights or conditions",
                false,
            ),
            FieldDefinition::new(
                "rights.expansion_rights",
                "Expansion Rights",
                C::RightsOptions,
                T::Text,
                "Rights to expand into additional space",
                false,
            ),
            FieldDefinition::new(
                "use.permitted_use",
                "Permitted Use",
                C::UseRestrictions,
                T::Text,
                "Permitted uses of the premises",
                false,
            ),
            FieldDefinition::new(
                "use.exclusive_use",
                "Exclusive Use Rights",
                C::UseRestrictions,
                T::Text,
                "Any exclusive use rights granted to tenant",
                false,
            ),
            FieldDefinition::new(
                "maintenance.landlord_responsibilities",
                "Landlord Maintenance Responsibilities",
                C::Maintenance,
                T::Text,
                "What the landlord is responsible for maintaining",
                false,
            ),
            FieldDefinition::new(
                "maintenance.tenant_responsibilities",
                "Tenant Maintenance Responsibilities",
                C::Maintenance,
                T::Text,
                "What the tenant is responsible for maintaining",
                false,
            ),
            FieldDefinition::new(
                "insurance.tenant_insurance_requirements",
                "Tenant Insurance Requirements",
                C::Insurance,
                T::Text,
                "Insurance coverage tenant must maintain",
                false,
            ),
            FieldDefinition::new(
                "other.parking_spaces",
                "Parking Spaces",
                C::Other,
                T::Number,
                "Number of parking spaces allocated to tenant",
                false,
            ),
            FieldDefinition::new(
                "other.parking_cost",
                "Parking Cost",
                C::Other,
                T::Currency,
                "Cost per parking space, if applicable",
                false,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_schema_paths_unique() {
        let schema = FieldSchema::lease();
        let mut paths: Vec<&str> = schema.paths().collect();
        let total = paths.len();
        paths.sort_unstable();
        paths.dedup();

        assert_eq!(paths.len(), total);
        assert!(total > 30);
    }

    #[test]
    fn test_by_path_and_category() {
        let schema = FieldSchema::lease();

        let rent = schema.by_path("rent.base_rent_monthly").unwrap();
        assert_eq!(rent.field_type, FieldType::Currency);
        assert!(rent.required);

        let dates = schema.by_category(FieldCategory::DatesTerm);
        assert_eq!(dates.len(), 4);
    }

    #[test]
    fn test_subset_preserves_order() {
        let schema = FieldSchema::lease();
        let subset = schema.subset(&[
            "dates.expiration_date".to_string(),
            "basic_info.lease_type".to_string(),
        ]);

        assert_eq!(subset.len(), 2);
        assert_eq!(subset.fields()[0].path, "basic_info.lease_type");
    }

    #[test]
    fn test_prompt_block_groups_by_category() {
        let schema = FieldSchema::lease();
        let block = schema.prompt_block();

        assert!(block.contains("## Rent"));
        assert!(block.contains("- rent.base_rent_monthly [currency]:"));
        assert!(block.contains("(REQUIRED)"));
    }

    #[test]
    fn test_required_fields() {
        let schema = FieldSchema::lease();
        assert!(schema
            .required_fields()
            .iter()
            .all(|f| f.required));
        assert!(!schema.required_fields().is_empty());
    }
}
