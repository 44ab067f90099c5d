//! API request and response DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{AppConfig, NamingMode, OutputMode};
use crate::pipeline::{Job, SessionPhase};

fn default_language() -> String {
    "es".to_string()
}

/// One file to transcribe, referencing an already-materialized local path.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FileSpecRequest {
    /// Local path of the media file.
    pub path: String,
    /// Transcription language code.
    #[serde(default = "default_language")]
    pub language: String,
}

/// Request to start a transcription session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartTranscriptionRequest {
    pub files: Vec<FileSpecRequest>,
}

/// Response with the session id for the progress stream.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartTranscriptionResponse {
    pub session_id: String,
}

/// Session snapshot: phase plus the full job records.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub phase: SessionPhase,
    pub jobs: Vec<Job>,
}

/// Config for GET. The API key is masked.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub deepgram_api_key: String,
    pub google_service_account_json: String,
    pub drive_folder_id: String,
    pub naming_mode: NamingMode,
    pub prefix: String,
    pub markdown_output_dir: String,
    /// Effective output mode derived from the settings above.
    pub output_mode: OutputMode,
}

impl ConfigResponse {
    /// Build the response from a config, masking the secret.
    pub fn from_config(config: &AppConfig) -> Self {
        let masked = if config.deepgram_api_key.is_empty() {
            String::new()
        } else {
            "***".to_string()
        };
        Self {
            deepgram_api_key: masked,
            google_service_account_json: config.google_service_account_json.clone(),
            drive_folder_id: config.drive_folder_id.clone(),
            naming_mode: config.naming_mode,
            prefix: config.prefix.clone(),
            markdown_output_dir: config.markdown_output_dir.clone(),
            output_mode: config.output_mode(),
        }
    }
}

/// Partial config update for PUT.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfigUpdateRequest {
    pub deepgram_api_key: Option<String>,
    pub google_service_account_json: Option<String>,
    pub drive_folder_id: Option<String>,
    pub naming_mode: Option<NamingMode>,
    pub prefix: Option<String>,
    pub markdown_output_dir: Option<String>,
}

impl ConfigUpdateRequest {
    /// Apply the provided fields onto an existing config.
    pub fn apply_to(self, config: &mut AppConfig) {
        if let Some(v) = self.deepgram_api_key {
            config.deepgram_api_key = v;
        }
        if let Some(v) = self.google_service_account_json {
            config.google_service_account_json = v;
        }
        if let Some(v) = self.drive_folder_id {
            config.drive_folder_id = v;
        }
        if let Some(v) = self.naming_mode {
            config.naming_mode = v;
        }
        if let Some(v) = self.prefix {
            config.prefix = v;
        }
        if let Some(v) = self.markdown_output_dir {
            config.markdown_output_dir = v;
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Sessions currently held in memory.
    pub active_sessions: usize,
}
