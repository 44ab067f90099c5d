//! Speech-to-text provider interface and the Deepgram client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::audio;
use crate::{Error, Result};

const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(600);
const MODEL: &str = "nova-3";

/// External transcription collaborator.
///
/// Progress messages are pushed through `status` as they occur so the caller
/// can relay them to subscribers without buffering.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(
        &self,
        source: &Path,
        language: &str,
        status: mpsc::Sender<String>,
    ) -> Result<String>;
}

/// Deepgram pre-recorded transcription client.
pub struct DeepgramClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepgramClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEEPGRAM_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize, Default)]
struct ListenAlternative {
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    paragraphs: Option<ListenParagraphs>,
}

#[derive(Debug, Deserialize)]
struct ListenParagraphs {
    #[serde(default)]
    transcript: Option<String>,
}

/// Prefer the paragraph-formatted transcript, fall back to the plain one.
fn select_transcript(response: ListenResponse) -> String {
    let alternative = response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .unwrap_or_default();

    if let Some(paragraphs) = alternative.paragraphs
        && let Some(text) = paragraphs.transcript
        && !text.is_empty()
    {
        return text;
    }
    alternative.transcript.unwrap_or_default()
}

fn status_to_error(status: StatusCode, body: &str) -> Error {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::provider(format!(
            "Deepgram rejected the API key ({}): {}",
            status, snippet
        )),
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => Error::provider(format!(
            "Deepgram quota exceeded ({}): {}",
            status, snippet
        )),
        _ => Error::provider(format!("Deepgram request failed ({}): {}", status, snippet)),
    }
}

#[async_trait]
impl TranscriptionProvider for DeepgramClient {
    async fn transcribe(
        &self,
        source: &Path,
        language: &str,
        status: mpsc::Sender<String>,
    ) -> Result<String> {
        let prepared = audio::prepare_source(source, &status).await?;

        let _ = status.send("Uploading to Deepgram...".to_string()).await;
        let body = tokio::fs::read(&prepared.path).await?;
        debug!(
            source = %source.display(),
            bytes = body.len(),
            language,
            "sending media to Deepgram"
        );

        let response = self
            .http
            .post(format!("{}/v1/listen", self.base_url))
            .query(&[
                ("model", MODEL),
                ("language", language),
                ("smart_format", "true"),
                ("paragraphs", "true"),
                ("diarize", "true"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .header(CONTENT_TYPE, prepared.content_type)
            .timeout(TRANSCRIBE_TIMEOUT)
            .body(body)
            .send()
            .await?;

        let status_code = response.status();
        if !status_code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status_code, &body));
        }

        let parsed: ListenResponse = response.json().await?;
        Ok(select_transcript(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_transcript_prefers_paragraphs() {
        let json = serde_json::json!({
            "results": {
                "channels": [{
                    "alternatives": [{
                        "transcript": "plain text",
                        "paragraphs": { "transcript": "formatted\n\ntext" }
                    }]
                }]
            }
        });
        let response: ListenResponse = serde_json::from_value(json).unwrap();
        assert_eq!(select_transcript(response), "formatted\n\ntext");
    }

    #[test]
    fn test_select_transcript_falls_back_to_plain() {
        let json = serde_json::json!({
            "results": {
                "channels": [{
                    "alternatives": [{ "transcript": "plain text" }]
                }]
            }
        });
        let response: ListenResponse = serde_json::from_value(json).unwrap();
        assert_eq!(select_transcript(response), "plain text");
    }

    #[test]
    fn test_select_transcript_empty_response() {
        let json = serde_json::json!({ "results": { "channels": [] } });
        let response: ListenResponse = serde_json::from_value(json).unwrap();
        assert_eq!(select_transcript(response), "");
    }

    #[test]
    fn test_auth_errors_are_provider_errors() {
        let err = status_to_error(StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, Error::Provider(_)));
        assert!(!err.is_session_fatal());
        assert!(err.to_string().contains("401"));
    }
}
