//! Speech synthesis through the public Google Translate TTS endpoint.
//!
//! One GET per chunk; the response body is an MP3 clip.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::SpeechSynthesizer;
use crate::error::SynthesisError;

pub const DEFAULT_ENDPOINT: &str = "https://translate.google.com/translate_tts";
pub const DEFAULT_CLIENT: &str = "tw-ob";

/// HTTP client for the translate TTS endpoint
pub struct GoogleTranslateTts {
    endpoint: String,
    client_id: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GoogleTranslateTts {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_ENDPOINT, timeout)
    }

    /// Use a preconfigured client and a custom endpoint
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_id: DEFAULT_CLIENT.to_string(),
            timeout,
            client,
        }
    }

    /// Override the `client` query parameter
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full request URL for a piece of text
    pub fn request_url(&self, text: &str, language: &str) -> String {
        format!(
            "{}?ie=UTF-8&q={}&tl={}&client={}",
            self.endpoint,
            urlencoding::encode(text),
            urlencoding::encode(language),
            urlencoding::encode(&self.client_id)
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate-tts"
    }

    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
        let url = self.request_url(text, language);
        debug!(chars = text.chars().count(), language, "Requesting speech");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        if bytes.is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }

        Ok(bytes.to_vec())
    }
}

impl GoogleTranslateTts {
    fn classify(&self, error: reqwest::Error) -> SynthesisError {
        if error.is_timeout() {
            SynthesisError::Timeout(self.timeout)
        } else {
            SynthesisError::Network(error.to_string())
        }
    }
}
