//! Application configuration: output/naming modes and the env-backed store.

mod languages;
mod store;

pub use languages::{LANGUAGES, language_label};
pub use store::{ConfigStore, EnvConfigStore};

use serde::{Deserialize, Serialize};

/// How exported documents are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    /// Number titles from the history's next sequential slot.
    #[default]
    Sequential,
    /// Derive titles from the source file name.
    Original,
}

impl NamingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Original => "original",
        }
    }
}

/// Where transcripts end up after transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Upload to a Google Doc in the configured Drive folder.
    GoogleDocs,
    /// Write a local Markdown file.
    Markdown,
    /// Keep the transcript on the job only; no export stage runs.
    TranscriptOnly,
}

impl OutputMode {
    /// True when a job finishes directly after transcription.
    pub fn skips_export(self) -> bool {
        matches!(self, Self::TranscriptOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoogleDocs => "google_docs",
            Self::Markdown => "markdown",
            Self::TranscriptOnly => "transcript_only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "google_docs" => Some(Self::GoogleDocs),
            "markdown" => Some(Self::Markdown),
            "transcript_only" => Some(Self::TranscriptOnly),
            _ => None,
        }
    }
}

/// Application configuration, loaded through a [`ConfigStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deepgram API key; required before any session can start.
    pub deepgram_api_key: String,
    /// Path to a Google service-account JSON key file.
    pub google_service_account_json: String,
    /// Drive folder that receives exported documents.
    pub drive_folder_id: String,
    /// Document naming strategy.
    pub naming_mode: NamingMode,
    /// Title prefix for exported documents.
    pub prefix: String,
    /// Output directory for Markdown exports.
    pub markdown_output_dir: String,
    /// Explicit output mode; `None` derives it from the Google settings.
    pub output_mode_override: Option<OutputMode>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            deepgram_api_key: String::new(),
            google_service_account_json: String::new(),
            drive_folder_id: String::new(),
            naming_mode: NamingMode::Sequential,
            prefix: "Transcripcion".to_string(),
            markdown_output_dir: "./output".to_string(),
            output_mode_override: None,
        }
    }
}

impl AppConfig {
    /// Effective output mode for a session.
    ///
    /// Google Docs requires both the service-account file and the folder id;
    /// otherwise exports fall back to local Markdown. An explicit override
    /// wins in all cases.
    pub fn output_mode(&self) -> OutputMode {
        if let Some(mode) = self.output_mode_override {
            return mode;
        }
        if !self.google_service_account_json.is_empty() && !self.drive_folder_id.is_empty() {
            OutputMode::GoogleDocs
        } else {
            OutputMode::Markdown
        }
    }
}

/// Build the export title for one job.
///
/// Sequential mode numbers titles `{prefix}_{n}`; original mode appends the
/// source file stem. Collision suffixes for original mode are the
/// orchestrator's concern since they need a history lookup.
pub fn build_doc_title(config: &AppConfig, file_stem: &str, sequential_number: i64) -> String {
    match config.naming_mode {
        NamingMode::Sequential => format!("{}_{}", config.prefix, sequential_number),
        NamingMode::Original => format!("{}_{}", config.prefix, file_stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_derivation() {
        let mut config = AppConfig::default();
        assert_eq!(config.output_mode(), OutputMode::Markdown);

        config.google_service_account_json = "/keys/sa.json".to_string();
        assert_eq!(config.output_mode(), OutputMode::Markdown);

        config.drive_folder_id = "folder123".to_string();
        assert_eq!(config.output_mode(), OutputMode::GoogleDocs);

        config.output_mode_override = Some(OutputMode::TranscriptOnly);
        assert_eq!(config.output_mode(), OutputMode::TranscriptOnly);
        assert!(config.output_mode().skips_export());
    }

    #[test]
    fn test_build_doc_title() {
        let mut config = AppConfig::default();
        assert_eq!(build_doc_title(&config, "interview", 3), "Transcripcion_3");

        config.naming_mode = NamingMode::Original;
        assert_eq!(
            build_doc_title(&config, "interview", 3),
            "Transcripcion_interview"
        );
    }

    #[test]
    fn test_output_mode_parse_roundtrip() {
        for mode in [
            OutputMode::GoogleDocs,
            OutputMode::Markdown,
            OutputMode::TranscriptOnly,
        ] {
            assert_eq!(OutputMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(OutputMode::parse("pdf"), None);
    }
}
