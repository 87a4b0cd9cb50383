//! OpenAI-compatible provider implementation
//!
//! Any endpoint that speaks the chat-completions wire format works here.

pub mod client;
pub mod types;

pub use client::HttpTransport;
pub use types::{ChatCompletionRequest, ChatCompletionResponse, CompletionEnvelope, Message};
