//! Stage execution for a single job: transcription and export.
//!
//! Outcomes are reported, not thrown: every provider failure ends up as a
//! field update on the job plus emitted events, and the runner returns a
//! [`StageOutcome`] the orchestrator can branch on. Only session-fatal
//! errors propagate as `Err`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use super::bus::EventPublisher;
use super::events::{EventLogLevel, PipelineEvent};
use super::job::{Job, JobStatus};
use super::store::JobStore;
use crate::Result;
use crate::config::{OutputMode, language_label};
use crate::providers::{Exporter, TranscriptionProvider};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Result of one stage call.
#[derive(Debug)]
pub enum StageOutcome {
    /// The job moved forward; snapshot reflects the new state.
    Advanced(Job),
    /// The job failed; the reason is recorded on the snapshot.
    Failed(Job),
}

impl StageOutcome {
    pub fn job(&self) -> &Job {
        match self {
            Self::Advanced(job) | Self::Failed(job) => job,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Executes the two ordered stages of one job against the external
/// providers, translating their outcomes into job-state transitions.
pub struct StageRunner {
    store: Arc<JobStore>,
    publisher: EventPublisher,
    transcriber: Arc<dyn TranscriptionProvider>,
    exporter: Option<Arc<dyn Exporter>>,
    output_mode: OutputMode,
}

impl StageRunner {
    pub fn new(
        store: Arc<JobStore>,
        publisher: EventPublisher,
        transcriber: Arc<dyn TranscriptionProvider>,
        exporter: Option<Arc<dyn Exporter>>,
        output_mode: OutputMode,
    ) -> Self {
        Self {
            store,
            publisher,
            transcriber,
            exporter,
            output_mode,
        }
    }

    /// Run the transcription stage.
    ///
    /// On success the job carries its transcript and advances to `exporting`
    /// at progress 0.5, or straight to `done` at 1.0 when the output mode
    /// has no export stage.
    pub async fn run_transcription(
        &self,
        job_id: &str,
        index: usize,
        total: usize,
    ) -> Result<StageOutcome> {
        let job = self.store.get(job_id)?;

        let size = match tokio::fs::metadata(&job.source_path).await {
            Ok(meta) => meta.len() as f64 / BYTES_PER_MB,
            Err(e) => {
                return self
                    .fail_job(
                        job_id,
                        format!("Cannot read {}: {}", job.source_path.display(), e),
                    )
                    .await;
            }
        };
        let language = language_label(&job.language);

        self.publisher
            .publish(PipelineEvent::status_label(format!(
                "Transcribing {} ({:.0} MB, {}) [{}/{}]...",
                job.file_name,
                size,
                language,
                index + 1,
                total
            )))
            .await;
        self.publisher
            .publish(PipelineEvent::log(
                EventLogLevel::Highlight,
                format!("Transcribing: {} ({:.0} MB, {})", job.file_name, size, language),
            ))
            .await;

        // Relay provider progress as dim log lines the moment they arrive.
        let (status_tx, mut status_rx) = mpsc::channel::<String>(16);
        let relay = tokio::spawn({
            let publisher = self.publisher.clone();
            async move {
                while let Some(message) = status_rx.recv().await {
                    publisher
                        .publish(PipelineEvent::log(
                            EventLogLevel::Dim,
                            format!("  {}", message),
                        ))
                        .await;
                }
            }
        });

        let result = self
            .transcriber
            .transcribe(&job.source_path, &job.language, status_tx)
            .await;
        let _ = relay.await;

        match result {
            Ok(transcript) => {
                let skips_export = self.output_mode.skips_export();
                let updated = self.store.update(job_id, |j| {
                    j.transcript = transcript;
                    if skips_export {
                        j.status = JobStatus::Done;
                        j.progress = 1.0;
                    } else {
                        j.status = JobStatus::Exporting;
                        j.progress = 0.5;
                    }
                })?;
                Ok(StageOutcome::Advanced(updated))
            }
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => self.fail_job(job_id, e.to_string()).await,
        }
    }

    /// Run the export stage with the already-built document title.
    pub async fn run_export(
        &self,
        job_id: &str,
        title: &str,
        index: usize,
        total: usize,
    ) -> Result<StageOutcome> {
        let job = self.store.get(job_id)?;
        let Some(exporter) = self.exporter.as_ref() else {
            // Unreachable under skip-export modes; treated as a bad setup.
            return Err(crate::Error::config(
                "export stage invoked without an exporter",
            ));
        };

        match self.output_mode {
            OutputMode::GoogleDocs => {
                self.publisher
                    .publish(PipelineEvent::status_label(format!(
                        "Uploading {} to Google Docs [{}/{}]...",
                        title,
                        index + 1,
                        total
                    )))
                    .await;
                self.publisher
                    .publish(PipelineEvent::log(
                        EventLogLevel::Highlight,
                        format!("Uploading: {}", title),
                    ))
                    .await;
            }
            _ => {
                self.publisher
                    .publish(PipelineEvent::status_label(format!(
                        "Saving {}.md [{}/{}]...",
                        title,
                        index + 1,
                        total
                    )))
                    .await;
                self.publisher
                    .publish(PipelineEvent::log(
                        EventLogLevel::Highlight,
                        format!("Saving: {}.md", title),
                    ))
                    .await;
            }
        }

        match exporter.export(title, &job.transcript).await {
            Ok(reference) => {
                let success_line = match &reference {
                    crate::providers::ExportRef::Doc { id, .. } => {
                        format!("Created: {} (ID: {})", title, id)
                    }
                    crate::providers::ExportRef::File { path } => {
                        format!("Saved: {}", path.display())
                    }
                };
                self.publisher
                    .publish(PipelineEvent::log(EventLogLevel::Success, success_line))
                    .await;

                let reference = reference.reference();
                let updated = self.store.update(job_id, |j| {
                    j.export_reference = reference;
                    j.status = JobStatus::Done;
                    j.progress = 1.0;
                })?;
                Ok(StageOutcome::Advanced(updated))
            }
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => self.fail_job(job_id, e.to_string()).await,
        }
    }

    async fn fail_job(&self, job_id: &str, reason: String) -> Result<StageOutcome> {
        warn!(job_id, error = %reason, "job stage failed");
        let updated = self.store.update(job_id, |j| {
            j.status = JobStatus::Failed;
            j.error = reason;
        })?;
        Ok(StageOutcome::Failed(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ExportRef;
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedTranscriber {
        result: std::result::Result<String, String>,
    }

    #[async_trait]
    impl TranscriptionProvider for FixedTranscriber {
        async fn transcribe(
            &self,
            _source: &Path,
            _language: &str,
            status: mpsc::Sender<String>,
        ) -> Result<String> {
            let _ = status.send("Uploading to provider...".to_string()).await;
            self.result
                .clone()
                .map_err(crate::Error::Provider)
        }
    }

    struct FixedExporter;

    #[async_trait]
    impl Exporter for FixedExporter {
        async fn export(&self, title: &str, _transcript: &str) -> Result<ExportRef> {
            Ok(ExportRef::File {
                path: format!("/out/{}.md", title).into(),
            })
        }
    }

    fn runner_with(
        transcriber: FixedTranscriber,
        output_mode: OutputMode,
    ) -> (StageRunner, Arc<JobStore>, crate::pipeline::ProgressBus) {
        let store = Arc::new(JobStore::new());
        let (bus, publisher) =
            crate::pipeline::ProgressBus::new(64, std::time::Duration::from_secs(30));
        let runner = StageRunner::new(
            Arc::clone(&store),
            publisher,
            Arc::new(transcriber),
            Some(Arc::new(FixedExporter)),
            output_mode,
        );
        (runner, store, bus)
    }

    fn existing_media_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"audio").unwrap();
        path
    }

    #[tokio::test]
    async fn test_transcription_success_advances_to_exporting() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, store, _bus) = runner_with(
            FixedTranscriber {
                result: Ok("hello".into()),
            },
            OutputMode::Markdown,
        );
        let job = store.create(existing_media_file(&dir), "clip.mp3", "en");
        store
            .update(&job.id, |j| j.status = JobStatus::Transcribing)
            .unwrap();

        let outcome = runner.run_transcription(&job.id, 0, 1).await.unwrap();
        assert!(!outcome.is_failed());
        let job = outcome.job();
        assert_eq!(job.status, JobStatus::Exporting);
        assert_eq!(job.progress, 0.5);
        assert_eq!(job.transcript, "hello");
    }

    #[tokio::test]
    async fn test_transcription_skips_export_when_mode_has_none() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, store, _bus) = runner_with(
            FixedTranscriber {
                result: Ok("hello".into()),
            },
            OutputMode::TranscriptOnly,
        );
        let job = store.create(existing_media_file(&dir), "clip.mp3", "en");
        store
            .update(&job.id, |j| j.status = JobStatus::Transcribing)
            .unwrap();

        let outcome = runner.run_transcription(&job.id, 0, 1).await.unwrap();
        let job = outcome.job();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.progress, 1.0);
        assert!(job.export_reference.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_job_local() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, store, _bus) = runner_with(
            FixedTranscriber {
                result: Err("Deepgram rejected the API key (401)".into()),
            },
            OutputMode::Markdown,
        );
        let job = store.create(existing_media_file(&dir), "clip.mp3", "en");
        store
            .update(&job.id, |j| j.status = JobStatus::Transcribing)
            .unwrap();

        let outcome = runner.run_transcription(&job.id, 0, 1).await.unwrap();
        assert!(outcome.is_failed());
        let job = outcome.job();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.contains("401"));
        assert_eq!(job.progress, 0.0);
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_job_without_provider_call() {
        let (runner, store, _bus) = runner_with(
            FixedTranscriber {
                result: Ok("never used".into()),
            },
            OutputMode::Markdown,
        );
        let job = store.create("/nonexistent/clip.mp3", "clip.mp3", "en");
        store
            .update(&job.id, |j| j.status = JobStatus::Transcribing)
            .unwrap();

        let outcome = runner.run_transcription(&job.id, 0, 1).await.unwrap();
        assert!(outcome.is_failed());
        assert!(outcome.job().error.contains("Cannot read"));
    }

    #[tokio::test]
    async fn test_export_success_completes_job() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, store, _bus) = runner_with(
            FixedTranscriber {
                result: Ok("hello".into()),
            },
            OutputMode::Markdown,
        );
        let job = store.create(existing_media_file(&dir), "clip.mp3", "en");
        store
            .update(&job.id, |j| j.status = JobStatus::Transcribing)
            .unwrap();
        runner.run_transcription(&job.id, 0, 1).await.unwrap();

        let outcome = runner.run_export(&job.id, "Title_1", 0, 1).await.unwrap();
        assert!(!outcome.is_failed());
        let job = outcome.job();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.progress, 1.0);
        assert_eq!(job.export_reference, "/out/Title_1.md");
    }
}
