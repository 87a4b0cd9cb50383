//! Chat-completions provider implementations

pub mod openai;

pub use openai::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionEnvelope, HttpTransport, Message,
};
