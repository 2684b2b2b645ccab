pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod schema;
pub mod validate;
pub mod value;

pub use config::{ConfigError, CostRates, ExtractionConfig};
pub use error::{Error, Result};
pub use extract::{
    parse, ModelBoundary, ModelError, ModelResponse, ModelResult, ParseError, ParseResult,
    PromptBuilder, PromptPayload, RateLimiter, RawFieldResult, RetryingBoundary, TokenUsage,
    WorkedExample,
};
pub use pipeline::{
    ExtractionPipeline, FailureCause, PipelineFailure, PipelineResult, PipelineState,
};
pub use progress::{NullSink, ProgressEvent, ProgressSink, Stage};
pub use schema::{FieldCategory, FieldDefinition, FieldSchema, FieldType};
pub use validate::{ConsistencyEngine, ConsistencyRule, ValidationEngine};
pub use value::{
    Citation, ConfidenceDelta, ExtractedValue, ExtractionMetadata, ExtractionResult, FieldValue,
    Severity, ValidationWarning, WARNING_PENALTY,
};
