mod model;
mod parser;
mod prompt;

pub use model::{
    ModelBoundary, ModelError, ModelResponse, ModelResult, RateLimiter, RawFieldResult,
    RetryingBoundary, TokenUsage,
};
pub use parser::{parse, ParseError, ParseResult};
pub use prompt::{PromptBuilder, PromptPayload, WorkedExample};
