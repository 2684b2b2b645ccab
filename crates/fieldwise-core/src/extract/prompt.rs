use serde::{Deserialize, Serialize};

use crate::schema::FieldSchema;
use crate::value::ExtractedValue;

/// A reviewed extraction used for few-shot grounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkedExample {
    pub field_path: String,
    pub source_text: String,
    pub correct_value: String,
    pub reasoning: String,
}

/// A fully assembled model request: instructions, document, and the schema
/// subset the call is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPayload {
    pub system_instructions: String,
    pub document_text: String,
    pub field_schema_subset: FieldSchema,
    pub worked_examples: Vec<WorkedExample>,
}

impl PromptPayload {
    /// The same payload with a stricter formatting instruction appended,
    /// used for the single corrective re-invocation after malformed output.
    #[must_use]
    pub fn with_strict_formatting(mut self) -> Self {
        self.system_instructions.push_str(STRICT_FORMAT_SUFFIX);
        self
    }
}

const RESPONSE_CONTRACT: &str = r#"Return ONLY a valid JSON object with this EXACT structure, no text before or after:
{
  "fields": {
    "<field_path>": {
      "value": <extracted value or null>,
      "reasoning": "<why you extracted this value>",
      "citation": {"page": <number>, "quote": "<brief relevant quote>"} or null,
      "confidence": <0.0 to 1.0>
    }
  }
}"#;

const TYPE_GUIDANCE: &str = r#"FIELD TYPE RULES:
- date: return ISO format YYYY-MM-DD. "January 1, 2024" becomes "2024-01-01".
- currency: numeric only, no symbols or thousands separators. "$15,000.00" becomes "15000.00". Do not convert between monthly and annual amounts.
- area: bare number, no units. "5,000 SF" becomes "5000". Distinguish rentable (RSF) from usable (USF) square footage.
- percentage: decimal fraction. "5%" becomes 0.05.
- number: bare number, no separators or unit words.
- boolean: true or false.
- address: full address with city, state, and ZIP. Put suite/unit numbers in their own field when one exists.
- text / list: verbatim from the document, trimmed."#;

const NULL_POLICY: &str = r#"NULL VALUE POLICY - a field's value may be null ONLY when one of these applies:
1. The field is not mentioned anywhere in the document.
2. The document marks it as "to be determined" or equivalent.
3. The document contradicts itself about the value.
4. The text is genuinely ambiguous about which value applies.
5. The relevant passage is unreadable due to document quality.
Never guess, infer a default, or fabricate a value. A null with reasoning beats a wrong value."#;

const STRICT_FORMAT_SUFFIX: &str = "\n\nIMPORTANT: Your previous response was not parseable. Respond with the JSON object ONLY. No markdown fences, no commentary, no trailing text. Every field in the schema must appear under \"fields\".";

/// Assembles initial and refinement extraction requests from a schema.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    schema: FieldSchema,
}

impl PromptBuilder {
    #[must_use]
    pub fn new(schema: FieldSchema) -> Self {
        Self { schema }
    }

    #[must_use]
    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Build the full first-pass extraction request.
    #[must_use]
    pub fn initial(&self, document_text: &str, examples: &[WorkedExample]) -> PromptPayload {
        let mut instructions = String::from(
            "You are a commercial document abstraction expert. Extract structured \
             information for every field in the schema below.\n\n\
             For each field: extract the exact value, explain your reasoning, cite \
             the page and a brief quote where you found it, and rate your confidence \
             from 0.0 to 1.0 based on how clear the source text is.\n\n",
        );
        instructions.push_str(TYPE_GUIDANCE);
        instructions.push_str("\n\n");
        instructions.push_str(NULL_POLICY);
        instructions.push_str("\n\n");
        instructions.push_str(RESPONSE_CONTRACT);
        instructions.push_str("\n\nFIELD SCHEMA:\n");
        instructions.push_str(&self.schema.prompt_block());

        if !examples.is_empty() {
            instructions.push_str("\nEXAMPLES OF CORRECT EXTRACTIONS:\n\n");
            for example in examples {
                instructions.push_str(&format!(
                    "Field: {}\nSource: {}\nCorrect Value: {}\nReasoning: {}\n\n",
                    example.field_path,
                    example.source_text,
                    example.correct_value,
                    example.reasoning
                ));
            }
        }

        PromptPayload {
            system_instructions: instructions,
            document_text: document_text.to_string(),
            field_schema_subset: self.schema.clone(),
            worked_examples: examples.to_vec(),
        }
    }

    /// Build the narrower second-pass request, scoped to the low-confidence
    /// fields and anchored with already-confident extractions as context.
    #[must_use]
    pub fn refinement(
        &self,
        document_text: &str,
        low_confidence_paths: &[String],
        confident_context: &[&ExtractedValue],
    ) -> PromptPayload {
        let subset = self.schema.subset(low_confidence_paths);

        let mut instructions = String::from(
            "You are a commercial document abstraction expert. A first extraction \
             pass left the fields below uncertain. Re-examine the document and \
             extract ONLY these fields, looking harder for the relevant passages.\n\n",
        );
        instructions.push_str(TYPE_GUIDANCE);
        instructions.push_str("\n\n");
        instructions.push_str(NULL_POLICY);
        instructions.push_str("\n\n");
        instructions.push_str(RESPONSE_CONTRACT);
        instructions.push_str("\n\nFIELDS TO RE-EXTRACT:\n");
        instructions.push_str(&subset.prompt_block());

        if !confident_context.is_empty() {
            instructions.push_str(
                "\nVALUES ALREADY EXTRACTED WITH HIGH CONFIDENCE (for context, do \
                 not re-extract these):\n",
            );
            for value in confident_context {
                let rendered = value
                    .normalized_value
                    .as_ref()
                    .map_or_else(|| "null".to_string(), |v| {
                        serde_json::to_string(v).unwrap_or_else(|_| "null".to_string())
                    });
                instructions.push_str(&format!("- {} = {}\n", value.field_path, rendered));
            }
        }

        PromptPayload {
            system_instructions: instructions,
            document_text: document_text.to_string(),
            field_schema_subset: subset,
            worked_examples: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(FieldSchema::lease())
    }

    #[test]
    fn test_initial_prompt_contains_guidance_and_schema() {
        let payload = builder().initial("THIS LEASE is made...", &[]);

        assert!(payload.system_instructions.contains("YYYY-MM-DD"));
        assert!(payload.system_instructions.contains("\"$15,000.00\" becomes \"15000.00\""));
        assert!(payload.system_instructions.contains("NULL VALUE POLICY"));
        assert!(payload.system_instructions.contains("rent.base_rent_monthly"));
        assert_eq!(payload.document_text, "THIS LEASE is made...");
        assert_eq!(payload.field_schema_subset.len(), FieldSchema::lease().len());
    }

    #[test]
    fn test_initial_prompt_embeds_worked_examples() {
        let examples = vec![WorkedExample {
            field_path: "rent.base_rent_monthly".into(),
            source_text: "Base Rent of $15,000.00 per month".into(),
            correct_value: "15000.00".into(),
            reasoning: "Stated directly in the rent section".into(),
        }];

        let payload = builder().initial("doc", &examples);

        assert!(payload.system_instructions.contains("EXAMPLES OF CORRECT EXTRACTIONS"));
        assert!(payload.system_instructions.contains("Base Rent of $15,000.00 per month"));
    }

    #[test]
    fn test_refinement_prompt_is_scoped() {
        let low = vec!["rent.rent_escalations".to_string()];
        let confident = ExtractedValue::new(
            "rent.base_rent_monthly",
            serde_json::json!("15000.00"),
            Some(FieldValue::Currency("15000.00".into())),
            0.95,
        );

        let payload = builder().refinement("doc", &low, &[&confident]);

        assert_eq!(payload.field_schema_subset.len(), 1);
        assert!(payload.system_instructions.contains("rent.rent_escalations"));
        assert!(payload.system_instructions.contains("rent.base_rent_monthly = "));
        // Scoped schema must not re-list confident fields for extraction.
        assert!(payload.field_schema_subset.by_path("rent.base_rent_monthly").is_none());
    }

    #[test]
    fn test_strict_formatting_suffix() {
        let payload = builder().initial("doc", &[]);
        let strict = payload.clone().with_strict_formatting();

        assert!(strict.system_instructions.len() > payload.system_instructions.len());
        assert!(strict.system_instructions.contains("not parseable"));
    }
}
