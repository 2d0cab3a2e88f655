//! Google Gemini API client.
//!
//! Covers the three calls the assistant needs:
//! - text generation (structuring, answer generation)
//! - vision (text extraction from photos)
//! - embeddings (document and query task types)

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Embedding intent, passed through to the model as `taskType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    Document,
    Query,
}

impl EmbeddingTask {
    fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTask::Document => "RETRIEVAL_DOCUMENT",
            EmbeddingTask::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    /// Create a client with an API key and generative model.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingSecret("GOOGLE_API_KEY".to_string()));
        }

        let http = Client::builder()
            .user_agent("second_brain/0.1.0")
            .build()
            .map_err(|e| Error::GeminiError(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: model.to_string(),
        })
    }

    /// Generate text for a prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::Text {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.4,
                max_output_tokens: 4096,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let text = self.post_json(&url, &payload).await?;

        let response: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            Error::GeminiError(format!("Invalid Gemini response: {} - {}", e, text))
        })?;

        response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| match p {
                Part::Text { text } => Some(text.clone()),
                Part::InlineData { .. } => None,
            })
            .ok_or_else(|| Error::GeminiError("Empty response from Gemini".to_string()))
    }

    /// Extract text from an image (OCR via vision).
    pub async fn extract_image_text(&self, image_data: &[u8], mime_type: &str) -> Result<String> {
        use base64::Engine;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let payload = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64,
                        },
                    },
                    Part::Text {
                        text: "Extract all text from this image.".to_string(),
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.0,
                max_output_tokens: 4096,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let text = self.post_json(&url, &payload).await?;

        let response: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| Error::GeminiError(format!("Invalid Gemini response: {}", e)))?;

        response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| match p {
                Part::Text { text } => Some(text.trim().to_string()),
                Part::InlineData { .. } => None,
            })
            .ok_or_else(|| Error::GeminiError("Empty response from Gemini".to_string()))
    }

    /// Embed a text with the given model and task type.
    pub async fn embed_content(
        &self,
        model: &str,
        text: &str,
        task: EmbeddingTask,
    ) -> Result<Vec<f32>> {
        let payload = EmbedRequest {
            model: format!("models/{}", model),
            content: EmbedContent {
                parts: vec![Part::Text {
                    text: text.to_string(),
                }],
            },
            task_type: task.as_str().to_string(),
        };

        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, model, self.api_key
        );

        let text = self.post_json(&url, &payload).await?;

        let response: EmbedResponse = serde_json::from_str(&text)
            .map_err(|e| Error::GeminiError(format!("Invalid embedding response: {}", e)))?;

        Ok(response.embedding.values)
    }

    async fn post_json<T: Serialize>(&self, url: &str, payload: &T) -> Result<String> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::GeminiError(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::GeminiError(format!("Failed to read response: {}", e)))?;

        if status.as_u16() == 429 {
            return Err(Error::RateLimited(format!("Gemini 429: {}", text)));
        }
        if !status.is_success() {
            return Err(Error::GeminiError(format!(
                "Gemini error {}: {}",
                status, text
            )));
        }

        Ok(text)
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

// === Request structures ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

// === Response structures ===

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_key() {
        let err = GeminiClient::new("   ", "gemini-2.0-flash").unwrap_err();
        assert!(matches!(err, Error::MissingSecret(_)));
    }

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test_key", "gemini-2.0-flash")
            .expect("client")
            .with_base_url(&server.base_url())
    }

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let server = MockServer::start_async().await;

        let generate_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .query_param("key", "test_key");
            then.status(200).json_body(json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [ { "text": "Hello!" } ] } }
                ]
            }));
        });

        let reply = client(&server).generate("Hi").await.unwrap();

        assert_eq!(reply, "Hello!");
        generate_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn generate_maps_429_to_rate_limited() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(429).body("resource exhausted");
        });

        let err = client(&server).generate("Hi").await.unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn generate_returns_error_on_non_success_status() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(500).body("internal");
        });

        let err = client(&server).generate("Hi").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Gemini error 500"));
        assert!(msg.contains("internal"));
    }

    #[tokio::test]
    async fn generate_returns_error_on_empty_candidates() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(200).json_body(json!({ "candidates": [] }));
        });

        let err = client(&server).generate("Hi").await.unwrap_err();
        assert!(err.to_string().contains("Empty response from Gemini"));
    }

    #[tokio::test]
    async fn embed_content_returns_vector_with_task_type() {
        let server = MockServer::start_async().await;

        let embed_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent")
                .is_true(|req| {
                    let body = String::from_utf8_lossy(req.body().as_ref());
                    body.contains("RETRIEVAL_DOCUMENT")
                });
            then.status(200)
                .json_body(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } }));
        });

        let vector = client(&server)
            .embed_content("text-embedding-004", "weekly report", EmbeddingTask::Document)
            .await
            .unwrap();

        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        embed_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn embed_content_query_task_type_in_body() {
        let server = MockServer::start_async().await;

        let embed_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent")
                .is_true(|req| {
                    let body = String::from_utf8_lossy(req.body().as_ref());
                    body.contains("RETRIEVAL_QUERY")
                });
            then.status(200)
                .json_body(json!({ "embedding": { "values": [1.0] } }));
        });

        client(&server)
            .embed_content("text-embedding-004", "what did I note?", EmbeddingTask::Query)
            .await
            .unwrap();

        embed_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn extract_image_text_sends_inline_data() {
        let server = MockServer::start_async().await;

        let ocr_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .is_true(|req| {
                    let body = String::from_utf8_lossy(req.body().as_ref());
                    body.contains("inline_data") && body.contains("image/jpeg")
                });
            then.status(200).json_body(json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [ { "text": "  extracted text\n" } ] } }
                ]
            }));
        });

        let text = client(&server)
            .extract_image_text(b"jpeg-bytes", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(text, "extracted text");
        ocr_mock.assert_calls(1);
    }
}
