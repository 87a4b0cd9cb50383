//! OpenAI-compatible chat-completions request and response types

use serde::{Deserialize, Serialize};

// ============================================================================
// COMPLETION TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Completion body as returned by the endpoint.
///
/// Every field is optional: compatible servers disagree on what they send.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Set by reasoning models instead of `content`.
    #[serde(default)]
    pub reasoning: Option<serde_json::Value>,
    #[serde(default)]
    pub reasoning_content: Option<serde_json::Value>,
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// What a successful completion body actually carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEnvelope {
    /// Non-empty answer text.
    Success {
        content: String,
        model: Option<String>,
    },
    /// Model produced reasoning output but no answer.
    ReasoningOnly,
    /// Output was cut off by the token limit before any answer.
    Truncated,
    MissingContent,
}

impl CompletionEnvelope {
    /// Resolve the first choice of a response into an envelope variant.
    pub fn from_response(response: ChatCompletionResponse) -> Self {
        let Some(choice) = response.choices.into_iter().next() else {
            return CompletionEnvelope::MissingContent;
        };
        let message = choice.message.unwrap_or_default();

        if let Some(content) = message.content.filter(|c| !c.trim().is_empty()) {
            return CompletionEnvelope::Success {
                content,
                model: response.model,
            };
        }

        if choice.finish_reason.as_deref() == Some("length") {
            return CompletionEnvelope::Truncated;
        }

        let has_reasoning = [&message.reasoning, &message.reasoning_content]
            .iter()
            .any(|field| field.as_ref().is_some_and(|v| !v.is_null()));
        if has_reasoning {
            CompletionEnvelope::ReasoningOnly
        } else {
            CompletionEnvelope::MissingContent
        }
    }
}

// ============================================================================
// ERROR BODIES
// ============================================================================

/// Error body, either `{error:{message|code}}` or `{message}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    /// Number or string depending on the server.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Most specific message the body carries.
    pub fn best_message(&self) -> Option<String> {
        if let Some(detail) = &self.error {
            if let Some(message) = detail.message.as_ref().filter(|m| !m.is_empty()) {
                return Some(message.clone());
            }
            match &detail.code {
                Some(serde_json::Value::String(code)) if !code.is_empty() => {
                    return Some(code.clone())
                }
                Some(serde_json::Value::Number(code)) => return Some(code.to_string()),
                _ => {}
            }
        }
        self.message.clone().filter(|m| !m.is_empty())
    }
}
