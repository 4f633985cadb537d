//! capricorn-llm: text generation capability.
//! Implements the LlmBackend trait, rate-limit aware retry with capped
//! exponential backoff, and per-call audit records.

pub mod backend;
pub mod retry;
pub mod audit;

pub use backend::{
    GeminiBackend, LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OpenAiCompatibleBackend,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
