/// LLM Client: the single point of entry for all OpenAI API calls in Tailor.
///
/// ARCHITECTURAL RULE: No other module may call the OpenAI API directly.
/// All LLM interactions (responses and file handles) MUST go through this module.
///
/// Model: gpt-4.1-mini (hardcoded, not configurable)
///
/// Every call is sent exactly once. A failed or timed-out request is
/// reported to the caller, which degrades instead of re-sending.
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod files;
pub mod prompts;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// The model used for all LLM calls in Tailor.
pub const MODEL: &str = "gpt-4.1-mini";
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One piece of user content sent to the model.
///
/// A resume reaches the model either as a file handle previously registered
/// through [`files`] or as inline text; prompts are always inline text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputFile { file_id: String },
    InputText { text: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::InputText { text: text.into() }
    }
}

/// A named JSON schema used to constrain model output (strict mode).
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<InputMessage<'a>>,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a [ContentPart],
}

#[derive(Debug, Serialize)]
struct TextConfig<'a> {
    format: FormatConfig<'a>,
}

#[derive(Debug, Serialize)]
struct FormatConfig<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    #[serde(default)]
    pub output: Vec<OutputItem>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every `output_text` block of every message item.
    /// Returns `None` when the model produced no text at all.
    pub fn output_text(&self) -> Option<String> {
        let text: String = self
            .output
            .iter()
            .filter(|item| item.item_type == "message")
            .flat_map(|item| item.content.iter())
            .filter(|block| block.block_type == "output_text")
            .filter_map(|block| block.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiError {
    pub error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiErrorBody {
    pub message: String,
}

/// The single LLM client used by all services in Tailor.
/// Wraps the OpenAI Responses API with structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Makes a single call to the Responses API, returning the full response
    /// object. Non-success statuses, transport errors and timeouts are all
    /// returned as errors without a second attempt.
    pub async fn call(
        &self,
        system: &str,
        content: &[ContentPart],
        schema: Option<&OutputSchema>,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = ResponsesRequest {
            model: MODEL,
            instructions: system,
            input: vec![InputMessage {
                role: "user",
                content,
            }],
            max_output_tokens: MAX_OUTPUT_TOKENS,
            text: schema.map(|s| TextConfig {
                format: FormatConfig {
                    format_type: "json_schema",
                    name: s.name,
                    schema: &s.schema,
                    strict: true,
                },
            }),
        };

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {status}");
            return Err(api_error(status.as_u16(), body));
        }

        let llm_response: LlmResponse = response.json().await?;

        if let Some(usage) = &llm_response.usage {
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(llm_response)
    }

    /// Calls the model and returns its raw text with any code fence removed.
    pub async fn call_text(&self, system: &str, content: &[ContentPart]) -> Result<String, LlmError> {
        let response = self.call(system, content, None).await?;
        let text = response.output_text().ok_or(LlmError::EmptyContent)?;
        Ok(strip_code_fences(&text).to_string())
    }

    /// Calls the model and deserializes the text response as JSON.
    /// With a schema the provider enforces the shape; without one the prompt
    /// must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        system: &str,
        content: &[ContentPart],
        schema: Option<&OutputSchema>,
    ) -> Result<T, LlmError> {
        let response = self.call(system, content, schema).await?;

        let text = response.output_text().ok_or(LlmError::EmptyContent)?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_code_fences(&text);

        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

pub(crate) fn api_error(status: u16, body: String) -> LlmError {
    let message = serde_json::from_str::<OpenAiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

/// Strips ```lang ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `latex`, `tex`, ...) up to the first newline.
    let body = match stripped.find('\n') {
        Some(newline) if !stripped[..newline].contains(char::is_whitespace) => {
            &stripped[newline + 1..]
        }
        _ => stripped,
    };
    body.trim_end()
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fences_latex_tag() {
        let input = "```latex\n\\documentclass{article}\n```";
        assert_eq!(strip_code_fences(input), "\\documentclass{article}");
    }

    #[test]
    fn test_strip_code_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_content_part_wire_format() {
        let file = serde_json::to_value(ContentPart::InputFile {
            file_id: "file-123".to_string(),
        })
        .unwrap();
        assert_eq!(file["type"], "input_file");
        assert_eq!(file["file_id"], "file-123");

        let text = serde_json::to_value(ContentPart::text("hello")).unwrap();
        assert_eq!(text["type"], "input_text");
        assert_eq!(text["text"], "hello");
    }

    #[test]
    fn test_output_text_joins_message_blocks() {
        let response: LlmResponse = serde_json::from_value(serde_json::json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "{\"sections\":"},
                    {"type": "output_text", "text": "[]}"}
                ]}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }))
        .unwrap();
        assert_eq!(response.output_text().as_deref(), Some("{\"sections\":[]}"));
    }

    #[test]
    fn test_output_text_none_when_empty() {
        let response: LlmResponse =
            serde_json::from_value(serde_json::json!({"output": []})).unwrap();
        assert!(response.output_text().is_none());
    }

    #[test]
    fn test_request_carries_strict_schema() {
        let schema = OutputSchema {
            name: "sections",
            schema: serde_json::json!({"type": "object"}),
        };
        let content = [ContentPart::text("hi")];
        let request = ResponsesRequest {
            model: MODEL,
            instructions: "sys",
            input: vec![InputMessage {
                role: "user",
                content: &content,
            }],
            max_output_tokens: MAX_OUTPUT_TOKENS,
            text: Some(TextConfig {
                format: FormatConfig {
                    format_type: "json_schema",
                    name: schema.name,
                    schema: &schema.schema,
                    strict: true,
                },
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["text"]["format"]["type"], "json_schema");
        assert_eq!(value["text"]["format"]["strict"], true);
        assert_eq!(value["input"][0]["content"][0]["type"], "input_text");
    }

    /// Answers every connection with `status` and counts the requests.
    async fn counting_server(
        status: &'static str,
    ) -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 64 * 1024];
                let _ = socket.read(&mut buf).await;
                let body = r#"{"error":{"message":"upstream unavailable"}}"#;
                let reply = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn test_server_error_is_not_resent() {
        let (base_url, hits) = counting_server("503 Service Unavailable").await;
        let client = LlmClient::new("sk-test".to_string())
            .unwrap()
            .with_base_url(base_url);

        let err = client
            .call("sys", &[ContentPart::text("hi")], None)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 503, .. }));
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_resent() {
        let (base_url, hits) = counting_server("429 Too Many Requests").await;
        let client = LlmClient::new("sk-test".to_string())
            .unwrap()
            .with_base_url(base_url);

        let err = client
            .call_text("sys", &[ContentPart::text("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 429, ref message } if message == "upstream unavailable"));
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_api_error_extracts_message() {
        let err = api_error(400, r#"{"error":{"message":"bad file"}}"#.to_string());
        assert!(matches!(err, LlmError::Api { status: 400, ref message } if message == "bad file"));
    }
}
