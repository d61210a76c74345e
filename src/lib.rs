//! # besthit
//!
//! Best-of-N document summarisation on top of an LLM chat API.
//!
//! ## Features
//!
//! - **Requirement-checked candidates**: every summary is checked against structural
//!   requirements (title, paragraph and token counts) and, optionally, LLM judges
//!   for correctness and completeness
//! - **Best-hit selection**: several candidates per call, the first valid one or
//!   the best-scored one wins
//! - **Injected collaborators**: the LLM transport and the prompt templates are
//!   traits passed in by the caller

pub mod config;
pub mod document;
pub mod judge;
pub mod llm;
pub mod metrics;
pub mod prompt;
pub mod requirements;
pub mod scoring;
pub mod server;
pub mod summarizer;

pub use config::Config;
pub use document::{Document, Report};
pub use llm::{GeminiLlmClient, LlmCallError, LlmClient, MockLlmClient};
pub use prompt::{PromptRenderer, TemplateRenderer};
pub use requirements::Requirement;
pub use summarizer::{
    BestHitSummarizer, SelectionPolicy, SummarizeError, Summarizer, SummarizerSettings,
};
