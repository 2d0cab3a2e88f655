//! OpenAI Whisper client for voice transcription.

use std::path::Path;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Speech-to-text client backed by Whisper.
#[derive(Debug, Clone)]
pub struct WhisperClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl WhisperClient {
    /// Create a client with an API key.
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingSecret("OPENAI_API_KEY".to_string()));
        }

        let http = Client::builder()
            .user_agent("second_brain/0.1.0")
            .build()
            .map_err(|e| Error::WhisperError(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    /// Transcribe an audio file to text.
    pub async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String> {
        let file_bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| Error::WhisperError(format!("Failed to read audio file: {}", e)))?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.ogg");

        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .text("language", language.to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string()),
            );

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::WhisperError(format!("Whisper request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::WhisperError(format!("Failed to read response: {}", e)))?;

        if status.as_u16() == 429 {
            return Err(Error::RateLimited(format!("Whisper 429: {}", text)));
        }
        if !status.is_success() {
            return Err(Error::WhisperError(format!(
                "Whisper error {}: {}",
                status, text
            )));
        }

        let transcription: TranscriptionResponse = serde_json::from_str(&text).map_err(|e| {
            Error::WhisperError(format!("Invalid transcription response: {}", e))
        })?;

        Ok(transcription.text.trim().to_string())
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}
