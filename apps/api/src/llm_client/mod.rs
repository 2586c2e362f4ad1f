/// LLM Client: the Anthropic Messages API implementation of `GenerationGateway`.
///
/// No other module talks to the provider directly; everything goes through
/// `Arc<dyn GenerationGateway>` so the backend can be swapped or faked.
///
/// Model: claude-sonnet-4-5 (hardcoded to prevent drift between environments)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod fences;
pub mod gateway;
pub mod prompts;

use gateway::{Completion, CompletionRequest, GatewayError, GenerationGateway};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MODEL: &str = "claude-sonnet-4-5";
/// A full HTML document with inline styles is long; 4096 truncates rich resumes.
const MAX_TOKENS: u32 = 8192;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM refused the request")]
    Refused,

    #[error("LLM output truncated at {output_tokens} tokens")]
    Truncated { output_tokens: u32 },
}

impl From<LlmError> for GatewayError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Api { status, message } => match status {
                400 | 403 | 413 | 429 => GatewayError::Rejected(format!("{status}: {message}")),
                _ => GatewayError::Unavailable(format!("{status}: {message}")),
            },
            LlmError::Refused => GatewayError::Rejected("provider refused the request".into()),
            other => GatewayError::Unavailable(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    choice_type: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
    pub name: Option<String>,
    pub input: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every text block in order.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }

    /// The input of the forced tool call named `tool`.
    pub fn tool_input(&self, tool: &str) -> Option<&Value> {
        self.content
            .iter()
            .find(|b| b.block_type == "tool_use" && b.name.as_deref() == Some(tool))
            .and_then(|b| b.input.as_ref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Wraps the Anthropic Messages API with retry logic, image attachments and
/// tool-forced structured output.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
        })
    }

    /// Sends one request, retrying on 429, 5xx and transport errors with
    /// exponential backoff.
    async fn send(&self, request_body: &AnthropicRequest<'_>) -> Result<LlmResponse, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}, stop_reason={:?}",
                llm_response.usage.input_tokens,
                llm_response.usage.output_tokens,
                llm_response.stop_reason
            );

            check_stop_reason(&llm_response)?;
            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// A partial document must never reach the caller as if it were complete.
fn check_stop_reason(response: &LlmResponse) -> Result<(), LlmError> {
    match response.stop_reason.as_deref() {
        Some("refusal") => Err(LlmError::Refused),
        Some("max_tokens") => {
            warn!(
                "LLM output hit max_tokens ({}); discarding partial result",
                response.usage.output_tokens
            );
            Err(LlmError::Truncated {
                output_tokens: response.usage.output_tokens,
            })
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl GenerationGateway for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let mut content = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            content.push(RequestBlock::Image {
                source: ImageSource {
                    source_type: "base64",
                    media_type: &image.media_type,
                    data: &image.base64_data,
                },
            });
        }
        content.push(RequestBlock::Text {
            text: &request.user_message,
        });

        let (tools, tool_choice) = match &request.output_shape {
            Some(shape) => (
                Some(vec![ToolDefinition {
                    name: shape.name,
                    description: "Return the generated resume in exactly this shape.",
                    input_schema: shape.json_schema(),
                }]),
                Some(ToolChoice {
                    choice_type: "tool",
                    name: shape.name,
                }),
            ),
            None => (None, None),
        };

        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &request.instructions,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
            tools,
            tool_choice,
        };

        let response = self.send(&body).await?;

        match &request.output_shape {
            Some(shape) => response
                .tool_input(shape.name)
                .filter(|input| input.is_object())
                .cloned()
                .map(Completion::Structured)
                .ok_or_else(|| {
                    GatewayError::Unavailable(format!(
                        "provider returned no '{}' structured output",
                        shape.name
                    ))
                }),
            None => response
                .text()
                .map(Completion::Text)
                .ok_or_else(|| LlmError::EmptyContent.into()),
        }
    }
}
