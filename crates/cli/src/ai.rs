// Model client for `gpilot ask`
//
// One blocking request to an OpenAI-compatible chat-completions endpoint.
// The reply is action markup, parsed into Actions. No retries.

use serde::{Deserialize, Serialize};

use gridpilot_actions::catalog::{ActionKind, Category};
use gridpilot_actions::{classify, parse_response, Action, TaskType};
use gridpilot_config::{AIProvider, ResolvedAIConfig};

/// Response from the model
#[derive(Debug, Clone)]
pub struct AskResponse {
    pub task: TaskType,

    /// Text outside the action tags
    pub explanation: String,

    pub actions: Vec<Action>,

    /// Warnings about the response
    pub warnings: Vec<String>,

    /// Raw response text (for debugging)
    pub raw_response: String,
}

/// Error from the model client
#[derive(Debug, Clone)]
pub enum AskError {
    /// Provider not configured
    NotConfigured(String),
    /// Provider not implemented
    NotImplemented(String),
    /// API key missing
    MissingKey,
    /// Network error
    NetworkError(String),
    /// API error response
    ApiError { status: u16, message: String },
    /// Failed to parse response
    ParseError(String),
    /// Provider returned unexpected format
    InvalidResponse(String),
}

impl std::fmt::Display for AskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AskError::NotConfigured(msg) => write!(f, "AI not configured: {}", msg),
            AskError::NotImplemented(msg) => write!(f, "Provider not implemented: {}", msg),
            AskError::MissingKey => write!(f, "API key not configured"),
            AskError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AskError::ApiError { status, message } => write!(f, "API error ({}): {}", status, message),
            AskError::ParseError(msg) => write!(f, "Failed to parse response: {}", msg),
            AskError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for AskError {}

// ============================================================================
// Chat-completions API types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Main API
// ============================================================================

/// Classify `instruction`, ask the model for Actions against the sheet
/// described by `sheet_preview`, and parse the reply.
///
/// This is a blocking call.
pub fn ask(config: &ResolvedAIConfig, instruction: &str, sheet_preview: &str) -> Result<AskResponse, AskError> {
    match config.provider {
        AIProvider::None => {
            return Err(AskError::NotConfigured("AI is disabled".to_string()));
        }
        AIProvider::OpenAI | AIProvider::Local => {}
        AIProvider::Anthropic => {
            return Err(AskError::NotImplemented(format!(
                "{} provider not yet implemented",
                config.provider.name()
            )));
        }
    }

    let api_key = if config.provider.needs_api_key() {
        Some(config.api_key.as_deref().ok_or(AskError::MissingKey)?)
    } else {
        config.api_key.as_deref()
    };

    let task = classify(instruction);
    tracing::debug!(task = %task, provider = config.provider.name(), model = %config.model, "asking model");

    let system_prompt = build_system_prompt(task);
    let user_prompt = build_user_prompt(instruction, sheet_preview);
    let content = call_chat(config, api_key, &system_prompt, &user_prompt)?;

    parse_ai_response(task, &content)
}

/// Catalog tags by category, then the guidance for `task`.
pub fn build_system_prompt(task: TaskType) -> String {
    let mut prompt = String::from(
        "You are a spreadsheet assistant. Turn the user's request into actions on their sheet.\n\n\
         RESPONSE FORMAT:\n\
         - Start with one or two sentences explaining what you will change.\n\
         - Then emit one tag per action:\n  \
           <action type=\"TYPE\" target=\"A1:B2\">DATA</action>\n\
         - Optional attributes: source, chartType, title, position.\n\
         - DATA is a JSON value or plain text, depending on the action type.\n\
         - Escape < > & in attributes as &lt; &gt; &amp;.\n\n\
         ACTION TYPES:\n",
    );

    let mut categories: Vec<Category> = Vec::new();
    for info in ActionKind::catalog() {
        if !categories.contains(&info.category) {
            categories.push(info.category);
        }
    }
    for category in categories {
        let tags: Vec<&str> = ActionKind::catalog()
            .iter()
            .filter(|info| info.category == category)
            .map(|info| info.tag)
            .collect();
        prompt.push_str(&format!("- {}: {}\n", category.label(), tags.join(", ")));
    }

    prompt.push_str("\nGUIDANCE:\n");
    prompt.push_str(task.guidance());
    prompt.push('\n');
    prompt
}

fn build_user_prompt(instruction: &str, sheet_preview: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("SHEET:\n");
    prompt.push_str(sheet_preview);
    prompt.push('\n');

    prompt.push_str("\nREQUEST:\n");
    prompt.push_str(instruction.trim());
    prompt.push('\n');

    prompt
}

fn call_chat(
    config: &ResolvedAIConfig,
    api_key: Option<&str>,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<String, AskError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AskError::NetworkError(e.to_string()))?;

    let request = ChatRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let url = format!("{}/chat/completions", config.endpoint);
    let mut builder = client.post(&url).header("Content-Type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }

    let response = builder
        .json(&request)
        .send()
        .map_err(|e| AskError::NetworkError(e.to_string()))?;

    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&error_text) {
            Ok(body) => body.error.message,
            Err(_) => error_text,
        };
        return Err(AskError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    let body: ChatResponse = response.json().map_err(|e| AskError::ParseError(e.to_string()))?;

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AskError::InvalidResponse("No choices in response".to_string()))?;
    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!("model reply was cut off at max_tokens ({})", config.max_tokens);
    }
    choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AskError::InvalidResponse("Empty message content".to_string()))
}

fn parse_ai_response(task: TaskType, content: &str) -> Result<AskResponse, AskError> {
    let parsed = parse_response(content);
    let mut warnings = Vec::new();

    if parsed.skipped > 0 {
        warnings.push(format!("Ignored {} action tag(s) without a type", parsed.skipped));
    }
    for action in &parsed.actions {
        if action.kind().is_unknown() {
            warnings.push(format!(
                "Unknown action type \"{}\" will be written as text",
                action.action_type
            ));
        }
    }
    if parsed.actions.is_empty() && parsed.explanation.is_empty() {
        return Err(AskError::InvalidResponse("Reply has no text and no actions".to_string()));
    }

    Ok(AskResponse {
        task,
        explanation: parsed.explanation,
        actions: parsed.actions,
        warnings,
        raw_response: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpilot_config::{AIConfigStatus, KeySource};
    use httpmock::prelude::*;

    fn config(provider: AIProvider, endpoint: String, key: Option<&str>) -> ResolvedAIConfig {
        ResolvedAIConfig {
            provider,
            model: "test-model".to_string(),
            endpoint,
            temperature: 0.2,
            max_tokens: 256,
            timeout_secs: 5,
            api_key: key.map(str::to_string),
            key_source: if key.is_some() { KeySource::Environment } else { KeySource::None },
            status: AIConfigStatus::Ready,
            blocking_reason: None,
        }
    }

    fn reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }]
        })
    }

    #[test]
    fn test_ask_parses_markup_reply() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test")
                .body_includes("\"model\":\"test-model\"")
                .body_includes("REQUEST:\\nmake the header bold");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(reply("Bolding the header.\n<action type=\"bold\" target=\"A1:C1\"></action>"));
        });

        let cfg = config(AIProvider::OpenAI, server.base_url(), Some("sk-test"));
        let response = ask(&cfg, "make the header bold", "Used range: Sheet1!A1:C3").unwrap();

        mock.assert();
        assert_eq!(response.task, TaskType::Formatting);
        assert_eq!(response.explanation, "Bolding the header.");
        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.actions[0].action_type, "bold");
        assert!(response.warnings.is_empty());
    }

    #[test]
    fn test_local_provider_sends_no_key() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions").header_missing("authorization");
            then.status(200).json_body(reply("Nothing to change."));
        });

        let cfg = config(AIProvider::Local, server.base_url(), None);
        let response = ask(&cfg, "hello", "").unwrap();
        mock.assert();
        assert!(response.actions.is_empty());
    }

    #[test]
    fn test_api_error_message_is_extracted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(401)
                .json_body(serde_json::json!({ "error": { "message": "Incorrect API key", "type": "auth" } }));
        });

        let cfg = config(AIProvider::OpenAI, server.base_url(), Some("sk-bad"));
        match ask(&cfg, "sum column B", "").unwrap_err() {
            AskError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_choices_is_invalid() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(serde_json::json!({ "choices": [] }));
        });

        let cfg = config(AIProvider::OpenAI, server.base_url(), Some("sk-test"));
        assert!(matches!(ask(&cfg, "x", ""), Err(AskError::InvalidResponse(_))));
    }

    #[test]
    fn test_preflight_errors() {
        let off = config(AIProvider::None, String::new(), None);
        assert!(matches!(ask(&off, "x", ""), Err(AskError::NotConfigured(_))));

        let keyless = config(AIProvider::OpenAI, String::new(), None);
        assert!(matches!(ask(&keyless, "x", ""), Err(AskError::MissingKey)));

        let anthropic = config(AIProvider::Anthropic, String::new(), Some("k"));
        assert!(matches!(ask(&anthropic, "x", ""), Err(AskError::NotImplemented(_))));
    }

    #[test]
    fn test_system_prompt_lists_tags_and_guidance() {
        let prompt = build_system_prompt(TaskType::Chart);
        assert!(prompt.contains("values"));
        assert!(prompt.contains("chart"));
        assert!(prompt.contains(TaskType::Chart.guidance()));
    }

    #[test]
    fn test_unknown_types_warn() {
        let response = parse_ai_response(
            TaskType::General,
            "Ok.<action type=\"teleport\" target=\"A1\">x</action><action target=\"B1\"/>",
        )
        .unwrap();
        assert_eq!(response.actions.len(), 1);
        assert_eq!(response.warnings.len(), 2);
    }
}
