pub mod mistral;

pub use mistral::{ChatMessage, LlmClient, LlmConfig, LlmError};
