use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::config::{ConfigError, ExtractionConfig};
use crate::extract::{
    parse, ModelBoundary, ModelError, ParseError, PromptBuilder, PromptPayload, TokenUsage,
    WorkedExample,
};
use crate::progress::{NullSink, ProgressEvent, ProgressSink, Stage};
use crate::schema::FieldSchema;
use crate::validate::ValidationEngine;
use crate::value::{ConfidenceDelta, ExtractedValue, ExtractionResult};

/// Lifecycle of one extraction run. Transitions only move forward; any stage
/// may fall into `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initial,
    Parsed,
    Validated,
    Refined,
    Complete,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub fn permits(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initial, Self::Parsed)
                | (Self::Parsed, Self::Validated)
                | (Self::Validated, Self::Refined | Self::Complete)
                | (Self::Refined, Self::Complete)
                | (
                    Self::Initial | Self::Parsed | Self::Validated | Self::Refined,
                    Self::Failed
                )
        )
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(
        state.permits(next),
        "illegal pipeline transition {state:?} -> {next:?}"
    );
    tracing::debug!(from = ?state, to = ?next, "pipeline transition");
    *state = next;
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FailureCause {
    /// Failures that warrant the single corrective re-invocation with
    /// stricter formatting instructions.
    fn is_correctable(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::Model(ModelError::MalformedResponse(_))
        )
    }
}

/// Terminal pipeline failure. Tokens consumed before the failure are still
/// accounted for.
#[derive(Debug, Error)]
#[error("extraction failed: {cause}")]
pub struct PipelineFailure {
    #[source]
    pub cause: FailureCause,
    pub usage: TokenUsage,
    pub cost: f64,
}

pub type PipelineResult<T> = Result<T, PipelineFailure>;

/// Orchestrates one extraction request end to end: prompt assembly, model
/// invocation, parsing, validation, and the optional refinement pass.
///
/// The boundary is injected, so hosts decide transport, retries, and rate
/// limiting by choosing what to wrap (see
/// [`RetryingBoundary`](crate::extract::RetryingBoundary)).
pub struct ExtractionPipeline {
    boundary: Arc<dyn ModelBoundary>,
    builder: PromptBuilder,
    validator: ValidationEngine,
    config: ExtractionConfig,
    sink: Arc<dyn ProgressSink>,
}

impl ExtractionPipeline {
    pub fn new(
        boundary: Arc<dyn ModelBoundary>,
        schema: FieldSchema,
        config: ExtractionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            boundary,
            builder: PromptBuilder::new(schema),
            validator: ValidationEngine::new(config.cross_field_tolerance),
            config,
            sink: Arc::new(NullSink),
        })
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the full pipeline over already-extracted document text.
    ///
    /// When every field clears the confidence threshold this makes exactly
    /// one model call; otherwise a second, narrower call re-extracts the
    /// uncertain fields and merges any strictly-better values.
    pub async fn run(
        &self,
        document_text: &str,
        examples: &[WorkedExample],
    ) -> PipelineResult<ExtractionResult> {
        let started = Instant::now();
        let mut usage = TokenUsage::default();
        let mut state = PipelineState::Initial;

        self.emit(Stage::ExtractingText, started, format!("{} characters", document_text.len()))
            .await;
        self.emit(Stage::Analyzing, started, "requesting field extraction").await;

        let payload = self.builder.initial(document_text, examples);
        let mut result = match self
            .invoke_parsed(&payload, self.builder.schema(), &mut usage)
            .await
        {
            Ok(result) => result,
            Err(cause) => return Err(self.fail(&mut state, cause, usage)),
        };
        advance(&mut state, PipelineState::Parsed);
        self.emit(Stage::Parsing, started, format!("{} fields parsed", result.values.len()))
            .await;

        self.emit(Stage::Validating, started, "normalizing and cross-checking").await;
        self.validator.run(&mut result, self.builder.schema());
        advance(&mut state, PipelineState::Validated);

        let low = self.low_confidence_paths(&result);
        if self.config.enable_refinement && !low.is_empty() {
            self.emit(Stage::Refining, started, format!("{} fields below threshold", low.len()))
                .await;
            self.refine(document_text, &mut result, &low, &mut usage).await;
            advance(&mut state, PipelineState::Refined);
        }

        result.metadata.input_tokens = usage.input_tokens;
        result.metadata.output_tokens = usage.output_tokens;
        result.metadata.total_cost = self.config.cost_rates.cost(&usage);
        result.metadata.elapsed_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.emit(Stage::Saving, started, "assembling result").await;
        advance(&mut state, PipelineState::Complete);
        self.emit(Stage::Complete, started, "extraction complete").await;

        Ok(result)
    }

    async fn emit(&self, stage: Stage, started: Instant, detail: impl Into<String>) {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.sink
            .report(ProgressEvent::new(stage, elapsed, detail))
            .await;
    }

    fn fail(
        &self,
        state: &mut PipelineState,
        cause: FailureCause,
        usage: TokenUsage,
    ) -> PipelineFailure {
        advance(state, PipelineState::Failed);
        tracing::error!(error = %cause, "pipeline failed");
        PipelineFailure {
            cost: self.config.cost_rates.cost(&usage),
            cause,
            usage,
        }
    }

    /// One model call plus parse, with at most one corrective re-invocation
    /// when the output is structurally unusable.
    async fn invoke_parsed(
        &self,
        payload: &PromptPayload,
        schema: &FieldSchema,
        usage: &mut TokenUsage,
    ) -> Result<ExtractionResult, FailureCause> {
        match self.call_once(payload, schema, usage).await {
            Err(cause) if cause.is_correctable() => {
                tracing::warn!(
                    error = %cause,
                    "unusable model output, re-invoking with strict formatting"
                );
                let strict = payload.clone().with_strict_formatting();
                self.call_once(&strict, schema, usage).await
            }
            other => other,
        }
    }

    async fn call_once(
        &self,
        payload: &PromptPayload,
        schema: &FieldSchema,
        usage: &mut TokenUsage,
    ) -> Result<ExtractionResult, FailureCause> {
        let response = self.boundary.invoke(payload).await?;
        usage.add(response.usage);
        Ok(parse(&response, schema)?)
    }

    fn low_confidence_paths(&self, result: &ExtractionResult) -> Vec<String> {
        result
            .values
            .values()
            .filter(|v| v.confidence < self.config.confidence_threshold)
            .map(|v| v.field_path.clone())
            .collect()
    }

    /// Second-pass extraction for the uncertain fields. A failure here keeps
    /// the first-pass values; refinement never makes a result worse.
    async fn refine(
        &self,
        document_text: &str,
        result: &mut ExtractionResult,
        low: &[String],
        usage: &mut TokenUsage,
    ) {
        let payload = {
            let confident: Vec<&ExtractedValue> = result
                .values
                .values()
                .filter(|v| {
                    v.confidence >= self.config.confidence_threshold
                        && v.normalized_value.is_some()
                })
                .collect();
            self.builder.refinement(document_text, low, &confident)
        };
        let subset = self.builder.schema().subset(low);

        let mut refined = match self.invoke_parsed(&payload, &subset, usage).await {
            Ok(refined) => refined,
            Err(cause) => {
                tracing::warn!(error = %cause, "refinement pass failed, keeping first-pass values");
                return;
            }
        };
        self.validator.run(&mut refined, &subset);

        for path in low {
            let Some(original) = result.values.get(path) else {
                continue;
            };
            let before = original.confidence;

            let replacement = refined
                .get(path)
                .filter(|candidate| candidate.confidence > before)
                .cloned();

            let after = match replacement {
                Some(value) => {
                    let after = value.confidence;
                    // The old value's warnings go with it.
                    result.warnings.retain(|w| &w.field_path != path);
                    result
                        .warnings
                        .extend(refined.warnings_for(path).into_iter().cloned());
                    result.values.insert(path.clone(), value);
                    result.metadata.refined_fields.push(path.clone());
                    after
                }
                None => before,
            };

            result
                .metadata
                .refinement_improvements
                .insert(path.clone(), ConfidenceDelta { before, after });
        }
    }
}
