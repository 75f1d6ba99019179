pub mod claude;
pub mod error;
mod parse;
pub mod provider;

pub use error::LlmError;
pub use provider::{
    create_provider, LlmProvider, ScoreRequest, ScoringResult, SummaryRequest, SummaryResult,
    Ticker,
};
