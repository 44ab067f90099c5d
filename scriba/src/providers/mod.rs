//! External collaborators: the speech-to-text provider and the export
//! targets. The pipeline only ever sees the traits; the concrete clients
//! live here.

mod audio;
mod export;
mod transcription;

pub use audio::{AUDIO_EXTENSIONS, PreparedSource, is_audio_file, prepare_source};
pub use export::{ExportRef, Exporter, GoogleDocsExporter, MarkdownExporter};
pub use transcription::{DeepgramClient, TranscriptionProvider};

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::config::{AppConfig, OutputMode};

/// Builds provider instances for one session from its config snapshot.
///
/// The seam the session manager and tests share: production wires the real
/// clients, tests substitute scripted ones.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Transcription client for a session.
    fn transcriber(&self, config: &AppConfig) -> Arc<dyn TranscriptionProvider>;

    /// Exporter for a session's output mode; `None` when the mode has no
    /// export stage. Failing to construct one (e.g. an unreadable
    /// service-account file) is session-fatal.
    async fn exporter(&self, config: &AppConfig) -> Result<Option<Arc<dyn Exporter>>>;
}

/// Production factory wiring Deepgram and the configured export target.
#[derive(Default)]
pub struct DefaultProviderFactory;

impl DefaultProviderFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderFactory for DefaultProviderFactory {
    fn transcriber(&self, config: &AppConfig) -> Arc<dyn TranscriptionProvider> {
        Arc::new(DeepgramClient::new(&config.deepgram_api_key))
    }

    async fn exporter(&self, config: &AppConfig) -> Result<Option<Arc<dyn Exporter>>> {
        match config.output_mode() {
            OutputMode::GoogleDocs => {
                let exporter = GoogleDocsExporter::new(
                    &config.google_service_account_json,
                    &config.drive_folder_id,
                )?;
                Ok(Some(Arc::new(exporter)))
            }
            OutputMode::Markdown => Ok(Some(Arc::new(MarkdownExporter::new(
                &config.markdown_output_dir,
            )))),
            OutputMode::TranscriptOnly => Ok(None),
        }
    }
}
