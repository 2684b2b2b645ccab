use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use fieldwise_core::{
    Citation, ExtractionConfig, ExtractionPipeline, FieldSchema, FieldType, FieldValue,
    ModelBoundary, ModelResponse, ModelResult, ProgressEvent, ProgressSink, PromptPayload,
    RawFieldResult, Stage, TokenUsage,
};

struct ScriptedModel {
    responses: Mutex<VecDeque<ModelResponse>>,
}

impl ScriptedModel {
    fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait::async_trait]
impl ModelBoundary for ScriptedModel {
    async fn invoke(&self, _payload: &PromptPayload) -> ModelResult<ModelResponse> {
        Ok(self
            .responses
            .lock()
            .await
            .pop_front()
            .expect("scripted model ran out of responses"))
    }
}

struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

#[async_trait::async_trait]
impl ProgressSink for RecordingSink {
    async fn report(&self, event: ProgressEvent) {
        self.events.lock().await.push(event);
    }
}

fn confident_field(value: serde_json::Value, quote: &str, confidence: f64) -> RawFieldResult {
    RawFieldResult {
        value,
        reasoning: "stated directly in the document".into(),
        citation: Some(Citation::new(4, quote)),
        confidence,
    }
}

/// A response covering the whole lease schema so no field is left below the
/// refinement threshold by omission.
fn lease_response() -> ModelResponse {
    let mut response = ModelResponse {
        usage: TokenUsage {
            input_tokens: 20_000,
            output_tokens: 3_000,
        },
        ..Default::default()
    };

    for field in FieldSchema::lease().fields() {
        let value = match field.field_type {
            FieldType::Text => serde_json::json!("Sample value"),
            FieldType::Number => serde_json::json!(60),
            FieldType::Date => serde_json::json!("2024-01-01"),
            FieldType::Currency => serde_json::json!("100.00"),
            FieldType::Boolean => serde_json::json!(false),
            FieldType::Percentage => serde_json::json!(0.05),
            FieldType::Area => serde_json::json!("5000"),
            FieldType::Address => serde_json::json!("100 Congress Ave, Austin, TX 78701"),
            FieldType::List => serde_json::json!(["option to renew"]),
        };
        response
            .fields
            .insert(field.path.clone(), confident_field(value, "boilerplate", 0.9));
    }

    // Overwrite the interesting fields with realistic raw model output.
    response.fields.insert(
        "rent.base_rent_monthly".into(),
        confident_field(
            serde_json::json!("$15,000.00"),
            "Base Rent shall be $15,000.00 per month",
            0.95,
        ),
    );
    response.fields.insert(
        "rent.base_rent_annual".into(),
        confident_field(
            serde_json::json!("$180,000.00"),
            "an annualized Base Rent of $180,000.00",
            0.95,
        ),
    );
    response.fields.insert(
        "dates.commencement_date".into(),
        confident_field(serde_json::json!("January 1, 2024"), "commencing on January 1, 2024", 0.92),
    );
    response.fields.insert(
        "dates.expiration_date".into(),
        confident_field(serde_json::json!("December 31, 2028"), "expiring December 31, 2028", 0.92),
    );
    response
}

#[tokio::test]
async fn extracts_and_canonicalizes_a_lease_in_one_pass() {
    let model = ScriptedModel::new(vec![lease_response()]);
    let pipeline =
        ExtractionPipeline::new(model, FieldSchema::lease(), ExtractionConfig::default()).unwrap();

    let result = pipeline
        .run("THIS LEASE AGREEMENT is made and entered into...", &[])
        .await
        .unwrap();

    let rent = result.get("rent.base_rent_monthly").unwrap();
    assert_eq!(
        rent.normalized_value,
        Some(FieldValue::Currency("15000.00".into()))
    );
    assert!(rent.confidence >= 0.9);
    assert_eq!(
        rent.citation.as_ref().unwrap().quote,
        "Base Rent shall be $15,000.00 per month"
    );

    let commencement = result.get("dates.commencement_date").unwrap();
    assert_eq!(
        commencement.normalized_value,
        Some(FieldValue::Date("2024-01-01".into()))
    );

    // Annual and monthly rent agree, so no consistency warning for them.
    assert!(result.warnings_for("rent.base_rent_annual").is_empty());

    assert_eq!(result.metadata.input_tokens, 20_000);
    assert!(result.metadata.total_cost > 0.0);
    assert!(result.metadata.refined_fields.is_empty());
}

#[tokio::test]
async fn reports_progress_through_every_stage() {
    let model = ScriptedModel::new(vec![lease_response()]);
    let sink = Arc::new(RecordingSink {
        events: Mutex::new(Vec::new()),
    });
    let pipeline =
        ExtractionPipeline::new(model, FieldSchema::lease(), ExtractionConfig::default())
            .unwrap()
            .with_progress(sink.clone());

    pipeline.run("lease text", &[]).await.unwrap();

    let events = sink.events.lock().await;
    let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();

    assert_eq!(stages.first(), Some(&Stage::ExtractingText));
    assert_eq!(stages.last(), Some(&Stage::Complete));
    // No refinement was needed, so that stage never fires.
    assert!(!stages.contains(&Stage::Refining));

    // Percentages never move backwards.
    let mut last = 0;
    for event in events.iter() {
        assert!(event.percent >= last);
        last = event.percent;
    }
    assert_eq!(last, 100);
}

#[tokio::test]
async fn refinement_raises_confidence_without_extra_calls_elsewhere() {
    let mut first = lease_response();
    first
        .fields
        .get_mut("financial.security_deposit")
        .unwrap()
        .confidence = 0.3;

    let mut second = ModelResponse {
        usage: TokenUsage {
            input_tokens: 5_000,
            output_tokens: 400,
        },
        ..Default::default()
    };
    second.fields.insert(
        "financial.security_deposit".into(),
        confident_field(
            serde_json::json!("$30,000.00"),
            "Security Deposit in the amount of $30,000.00",
            0.88,
        ),
    );

    let model = ScriptedModel::new(vec![first, second]);
    let pipeline =
        ExtractionPipeline::new(model, FieldSchema::lease(), ExtractionConfig::default()).unwrap();

    let result = pipeline.run("lease text", &[]).await.unwrap();

    let deposit = result.get("financial.security_deposit").unwrap();
    assert_eq!(
        deposit.normalized_value,
        Some(FieldValue::Currency("30000.00".into()))
    );
    assert!((deposit.confidence - 0.88).abs() < f64::EPSILON);

    let delta = &result.metadata.refinement_improvements["financial.security_deposit"];
    assert!((delta.before - 0.3).abs() < f64::EPSILON);
    assert!(delta.after > delta.before);

    assert_eq!(result.metadata.input_tokens, 25_000);
}
