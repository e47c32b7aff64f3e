//! Chat-completion clients used for page summarization and image description.
//!
//! The summarization path deliberately degrades instead of failing: a page
//! whose summary cannot be generated is stored with a placeholder digest so
//! the rest of the document still makes it into the knowledge base. Every
//! other consumer of [`ChatClient`] propagates errors normally.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced by chat-completion providers.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider was unreachable before a response was received.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// One element of a user turn: plain text or an inline image.
#[derive(Debug, Clone)]
pub enum UserContent {
    /// Plain prompt text.
    Text(String),
    /// Image passed as a `data:` URL.
    ImageUrl(String),
}

/// Request passed to a chat-completion provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// User turn content, in order.
    pub user: Vec<UserContent>,
}

/// Interface implemented by chat-completion backends.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run one chat completion and return the assistant message text.
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError>;
}

/// OpenAI-compatible chat client issuing requests over HTTP.
pub struct OpenAiChatClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl OpenAiChatClient {
    /// Construct a client targeting the given OpenAI-compatible base URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent("pdfkb/chat").build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

fn user_content_to_json(content: &[UserContent]) -> Value {
    // A single text element is sent as a plain string for compatibility
    // with providers that reject the multi-part form.
    if let [UserContent::Text(text)] = content {
        return Value::String(text.clone());
    }

    Value::Array(
        content
            .iter()
            .map(|part| match part {
                UserContent::Text(text) => json!({ "type": "text", "text": text }),
                UserContent::ImageUrl(url) => json!({
                    "type": "image_url",
                    "image_url": { "url": url }
                }),
            })
            .collect(),
    )
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({
            "role": "user",
            "content": user_content_to_json(&request.user)
        }));

        let payload = json!({
            "model": request.model,
            "messages": messages,
        });

        let mut http_request = self.http.post(self.endpoint()).json(&payload);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request.send().await.map_err(|error| {
            ChatClientError::ProviderUnavailable(format!(
                "failed to reach chat provider at {}: {error}",
                self.base_url
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatClientError::ProviderUnavailable(format!(
                "chat endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "chat provider returned {status}: {body}"
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!(
                "failed to decode chat completion response: {error}"
            ))
        })?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            ChatClientError::InvalidResponse("chat completion response had no choices".into())
        })?;

        Ok(choice.message.content.trim().to_string())
    }
}

/// Generates bounded page digests via a chat model.
pub struct Summarizer {
    client: Box<dyn ChatClient>,
    model: String,
}

impl Summarizer {
    /// Wrap a chat client with the model used for summarization.
    pub fn new(client: Box<dyn ChatClient>, model: String) -> Self {
        Self { client, model }
    }

    /// Produce a short digest of one page's content.
    ///
    /// Summarization failure is page-local degradation: the error text is
    /// returned as a placeholder summary instead of aborting ingestion.
    pub async fn summarize(&self, page_content: &str, page_number: u32) -> String {
        let prompt = format!(
            "Write a concise summary (roughly 100-200 characters) of the \
             content of page {page_number} of a PDF document. The summary \
             should:\n\
             1. Extract the key facts and main points\n\
             2. Preserve important figures and conclusions\n\
             3. Ignore formatting and styling information\n\
             4. Use plain, compact language\n\n\
             Page content:\n{page_content}\n\n\
             Output the summary directly, without any preamble."
        );

        let request = ChatRequest {
            model: self.model.clone(),
            system: Some("You are a professional document summarization assistant.".to_string()),
            user: vec![UserContent::Text(prompt)],
        };

        match self.client.complete(request).await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(page_number, error = %error, "Summarization failed; storing placeholder");
                format!("failed to generate summary: {error}")
            }
        }
    }
}

/// Prompt used when describing embedded images. Tables are rendered as
/// Markdown and decorative elements are skipped so the output reads as prose.
const IMAGE_PROMPT: &str = "Describe the substantive information in this image, \
following these rules:\n\
1. Ignore all decorative elements: logos, icons, buttons, borders, background patterns\n\
2. Focus on text content, data, tables, and the key information in charts\n\
3. Render tables as Markdown tables, preserving their structure\n\
4. For charts, describe the data and trends, not colors or styling\n\
5. Output only content with real informational value\n\n\
Output the description directly, without any preamble.";

/// Describe one embedded image via a vision-capable chat model.
pub async fn describe_image(
    client: &dyn ChatClient,
    model: &str,
    image_bytes: &[u8],
    image_format: &str,
) -> Result<String, ChatClientError> {
    let data_url = format!(
        "data:image/{image_format};base64,{}",
        BASE64.encode(image_bytes)
    );

    client
        .complete(ChatRequest {
            model: model.to_string(),
            system: None,
            user: vec![
                UserContent::ImageUrl(data_url),
                UserContent::Text(IMAGE_PROMPT.to_string()),
            ],
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(base_url: String) -> OpenAiChatClient {
        OpenAiChatClient {
            http: Client::builder()
                .user_agent("pdfkb-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
        }
    }

    #[tokio::test]
    async fn chat_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client = test_client(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "  Digest text  " } }
                    ]
                }));
            })
            .await;

        let text = client
            .complete(ChatRequest {
                model: "gpt-test".into(),
                system: Some("system".into()),
                user: vec![UserContent::Text("summarize".into())],
            })
            .await
            .expect("completion");

        mock.assert();
        assert_eq!(text, "Digest text");
    }

    #[tokio::test]
    async fn chat_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client = test_client(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .complete(ChatRequest {
                model: "gpt-test".into(),
                system: None,
                user: vec![UserContent::Text("summarize".into())],
            })
            .await
            .expect_err("error response");

        assert!(matches!(error, ChatClientError::GenerationFailed(message) if message.contains("500")));
    }

    #[tokio::test]
    async fn summarizer_degrades_to_placeholder_on_failure() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(502).body("bad gateway");
            })
            .await;

        let summarizer = Summarizer::new(
            Box::new(test_client(server.base_url())),
            "gpt-test".into(),
        );

        let summary = summarizer.summarize("page text", 3).await;
        assert!(summary.starts_with("failed to generate summary:"));
    }

    #[tokio::test]
    async fn describe_image_sends_data_url() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("data:image/png;base64,");
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "A bar chart" } }
                    ]
                }));
            })
            .await;

        let client = test_client(server.base_url());
        let description = describe_image(&client, "vision-test", &[1, 2, 3], "png")
            .await
            .expect("description");

        mock.assert();
        assert_eq!(description, "A bar chart");
    }

    #[test]
    fn single_text_turn_collapses_to_string() {
        let value = user_content_to_json(&[UserContent::Text("hello".into())]);
        assert_eq!(value, Value::String("hello".into()));

        let mixed = user_content_to_json(&[
            UserContent::ImageUrl("data:image/png;base64,AA==".into()),
            UserContent::Text("describe".into()),
        ]);
        assert!(mixed.is_array());
        assert_eq!(mixed.as_array().map(Vec::len), Some(2));
    }
}
