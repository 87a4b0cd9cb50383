//! Prompt assembly for page analysis.

use crate::providers::{ChatCompletionRequest, Message};
use scamguard_core::{AnalysisRequest, ProviderConfig, RiskLevel, ThreatKind};

/// Token budget for the connection ping.
const PING_MAX_TOKENS: u32 = 16;

/// Build the chat-completions body for one analysis.
pub fn build_analysis_request(
    provider: &ProviderConfig,
    request: &AnalysisRequest,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: provider.model.clone(),
        messages: vec![Message::system(system_prompt()), Message::user(user_prompt(request))],
        temperature: provider.temperature,
        max_tokens: provider.max_tokens,
    }
}

/// Build the smallest request that proves the endpoint, key and model work.
pub fn build_ping_request(provider: &ProviderConfig) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: provider.model.clone(),
        messages: vec![Message::user("Reply with the single word OK.")],
        temperature: 0.0,
        max_tokens: PING_MAX_TOKENS,
    }
}

fn system_prompt() -> String {
    let levels = RiskLevel::ALL
        .iter()
        .map(|level| level.as_wire_str())
        .collect::<Vec<_>>()
        .join(", ");
    let threats = ThreatKind::ALL
        .iter()
        .map(|kind| kind.as_wire_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a fraud analyst reviewing a web page for scam indicators.\n\
         Answer with a single JSON object and nothing else:\n\
         {{\"riskLevel\": one of [{levels}],\n \
         \"threats\": array drawn from [{threats}],\n \
         \"explanation\": short plain-language reason,\n \
         \"confidence\": number between 0 and 1,\n \
         \"suspiciousPassages\": optional array of {{\"text\": verbatim page text, \
         \"labels\": threat tags, \"confidence\": number, \"reason\": short reason}}}}"
    )
}

fn user_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = format!(
        "URL: {}\nDomain: {}\n",
        request.target(),
        request.domain()
    );
    push_list(&mut prompt, "Suspicious links", request.suspicious_links());
    push_list(&mut prompt, "URL warnings", request.url_flags());
    push_list(&mut prompt, "Form warnings", request.form_flags());
    prompt.push_str("\nPage content:\n");
    prompt.push_str(request.content_sample());
    prompt
}

fn push_list(prompt: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    prompt.push_str(label);
    prompt.push_str(":\n");
    for item in items {
        prompt.push_str("- ");
        prompt.push_str(item);
        prompt.push('\n');
    }
}
