//! Image backend: one chat-completion call → one generated image.
//!
//! [`ImageBackend`] is the seam between the dispatcher and the network. The
//! dispatcher owns concurrency, timeouts and retries; a backend performs a
//! single attempt and classifies its failure. [`OpenRouterBackend`] speaks
//! the OpenRouter `/chat/completions` dialect with image output modality.
//!
//! ## Message Layout
//!
//! 1. **System message** *(optional)*: the slide design brief
//! 2. **Assistant message** *(optional)*: article text as grounding. Sent
//!    under the assistant role so the model treats it as prior context
//!    rather than as instructions.
//! 3. **User message**: the slide prompt; a two-part content list
//!    (text, then PNG data URI) when a style reference image is attached

use crate::batch::GenerationRequest;
use crate::config::GeneratorConfig;
use crate::error::{RequestError, SlidegenError};
use crate::pipeline::encode::{decode_data_url, to_png_data_url};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Maximum characters of an error body kept in [`RequestError::Status`].
const ERROR_BODY_CHARS: usize = 300;

/// Performs one generation attempt.
///
/// Implementations must be cheap to call concurrently; the dispatcher calls
/// `generate` from many tasks at once through an `Arc<dyn ImageBackend>`.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Send `request` once and return the decoded image bytes.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, RequestError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub modalities: [&'static str; 2],
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Build the JSON body for one request.
pub fn build_request_body<'a>(
    model: &'a str,
    request: &'a GenerationRequest,
) -> ChatCompletionRequest<'a> {
    let mut messages = Vec::with_capacity(3);

    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage {
            role: "system",
            content: MessageContent::Text(system),
        });
    }

    if let Some(context) = request.article_context.as_deref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage {
            role: "assistant",
            content: MessageContent::Text(context),
        });
    }

    let user_content = match request.reference_image.as_deref() {
        None => MessageContent::Text(&request.prompt),
        Some(image) => MessageContent::Parts(vec![
            ContentPart::Text {
                text: &request.prompt,
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: to_png_data_url(image),
                },
            },
        ]),
    };
    messages.push(ChatMessage {
        role: "user",
        content: user_content,
    });

    ChatCompletionRequest {
        model,
        messages,
        modalities: ["image", "text"],
    }
}

/// Pull the first generated image out of a chat-completion response.
///
/// Only `choices[0].message.images[0]` is inspected; later choices and
/// images may hold anything. Every deviation from that path holding a base64
/// data URI in `image_url.url` (or `imageUrl.url`) is a
/// [`RequestError::Shape`].
pub fn extract_image(body: &Value) -> Result<Vec<u8>, RequestError> {
    let Some(choice) = first_of(body.get("choices"), "choices")? else {
        let backend_error = body.get("error").filter(|e| !e.is_null());
        return Err(RequestError::Shape(match backend_error {
            Some(err) => format!("No choices in response (backend error: {err})"),
            None => "No choices in response".to_string(),
        }));
    };

    let message = match choice.get("message") {
        None | Some(Value::Null) => {
            return Err(RequestError::Shape("No message in first choice".into()))
        }
        Some(message @ Value::Object(_)) => message,
        Some(other) => return Err(unexpected("choices[0].message", other)),
    };

    let image = first_of(message.get("images"), "choices[0].message.images")?
        .ok_or_else(|| RequestError::Shape("No images in response".into()))?;

    let url = ["/image_url/url", "/imageUrl/url"]
        .into_iter()
        .find_map(|pointer| image.pointer(pointer)?.as_str().filter(|u| !u.is_empty()))
        .ok_or_else(|| RequestError::Shape("No image URL in first image".into()))?;

    decode_data_url(url).map_err(RequestError::Shape)
}

/// First element of an optional JSON array; absent, null and empty are all
/// `None`, any other type is a shape error.
fn first_of<'a>(value: Option<&'a Value>, path: &str) -> Result<Option<&'a Value>, RequestError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(items.first()),
        Some(other) => Err(unexpected(path, other)),
    }
}

fn unexpected(path: &str, value: &Value) -> RequestError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    RequestError::Shape(format!(
        "Failed to extract image from response: `{path}` is {kind}"
    ))
}

// ── OpenRouter ───────────────────────────────────────────────────────────

/// Backend for OpenRouter (or any server speaking its dialect).
///
/// Holds one `reqwest::Client` for the whole run; its idle pool is capped at
/// the configured concurrency.
pub struct OpenRouterBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenRouterBackend {
    pub fn new(config: &GeneratorConfig) -> Result<Self, SlidegenError> {
        if config.api_key.is_empty() {
            return Err(SlidegenError::MissingApiKey);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(config.concurrency);

        if let Some(ref proxy) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| SlidegenError::HttpClient(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SlidegenError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, e: reqwest::Error) -> RequestError {
        if e.is_timeout() {
            RequestError::Timeout {
                secs: self.timeout_secs,
            }
        } else if e.is_decode() {
            RequestError::Shape(format!("Failed to read response body: {e}"))
        } else if e.is_builder() {
            RequestError::Build(e.to_string())
        } else {
            RequestError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ImageBackend for OpenRouterBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, RequestError> {
        let body = build_request_body(&self.model, request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!("{} responded with {} bytes", self.endpoint, bytes.len());

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| RequestError::Shape(format!("Malformed JSON response: {e}")))?;

        extract_image(&value)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
