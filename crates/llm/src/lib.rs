pub mod mcq;
pub mod parse;
pub mod provider;
pub mod providers;

pub use mcq::{build_prompt, GenerationError, GenerationSettings, McqGenerator};
pub use parse::{parse_mcqs, validate_mcqs, Mcq, ValidationReport};
pub use provider::{LlmError, LlmProvider, Message, Role};
