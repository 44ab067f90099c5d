//! Drives one session's jobs through the pipeline in submission order.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::bus::EventPublisher;
use super::events::{EventLogLevel, PipelineEvent};
use super::job::{Job, JobStatus};
use super::session::{Session, SessionPhase};
use super::stage::StageRunner;
use crate::Result;
use crate::config::{AppConfig, NamingMode, build_doc_title};
use crate::history::{HistoryEntry, HistoryRepository};
use crate::providers::ProviderFactory;

/// Sequences stage execution across a session's jobs and publishes every
/// state change.
///
/// Jobs run strictly FIFO, one at a time, so all events of job A precede
/// job B's first transition and the subscriber sees one total order.
/// Job-local failures never stop the loop; a session-fatal error aborts the
/// whole batch.
pub struct PipelineOrchestrator {
    session: Arc<Session>,
    config: AppConfig,
    publisher: EventPublisher,
    history: Arc<dyn HistoryRepository>,
    providers: Arc<dyn ProviderFactory>,
}

impl PipelineOrchestrator {
    pub fn new(
        session: Arc<Session>,
        config: AppConfig,
        publisher: EventPublisher,
        history: Arc<dyn HistoryRepository>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            session,
            config,
            publisher,
            history,
            providers,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// Always ends by publishing a terminal `done` event and moving the
    /// session out of `running`; the publisher is dropped afterwards, which
    /// closes the stream's producer side.
    pub async fn run(self) {
        let session_id = self.session.id().to_string();
        info!(
            session_id = %session_id,
            jobs = self.session.store().len(),
            "pipeline started"
        );

        match self.run_inner().await {
            Ok(()) => {
                self.session.set_phase(SessionPhase::Completed);
                self.publisher
                    .publish(PipelineEvent::status_label("Done!"))
                    .await;
                self.publisher
                    .publish(PipelineEvent::log(
                        EventLogLevel::Success,
                        "All tasks completed.",
                    ))
                    .await;
                self.publisher.publish(PipelineEvent::Done).await;
                info!(session_id = %session_id, "pipeline completed");
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "pipeline aborted");
                let reason = e.to_string();

                // Every job that has not reached a terminal state fails with
                // the shared reason so the batch's outcome is fully recorded.
                for job in self.session.store().list() {
                    if job.status.is_terminal() {
                        continue;
                    }
                    match self.session.store().update(&job.id, |j| {
                        j.status = JobStatus::Failed;
                        j.error = reason.clone();
                    }) {
                        Ok(updated) => {
                            self.publisher
                                .publish(PipelineEvent::job_status(updated))
                                .await;
                        }
                        Err(e) => warn!(job_id = %job.id, error = %e, "failed to mark job"),
                    }
                }

                self.session.set_phase(SessionPhase::Aborted);
                self.publisher
                    .publish(PipelineEvent::Error { message: reason })
                    .await;
                self.publisher.publish(PipelineEvent::Done).await;
            }
        }
    }

    async fn run_inner(&self) -> Result<()> {
        let config = &self.config;
        let output_mode = config.output_mode();
        let store = self.session.store();

        // Provider setup happens before any job starts; an unusable
        // credential here invalidates the whole batch.
        let transcriber = self.providers.transcriber(config);
        let exporter = self.providers.exporter(config).await?;
        let runner = StageRunner::new(
            Arc::clone(store),
            self.publisher.clone(),
            transcriber,
            exporter,
            output_mode,
        );

        let mut next_seq: i64 = if config.naming_mode == NamingMode::Sequential {
            self.history.next_sequential_number(&config.prefix).await?
        } else {
            1
        };

        let jobs = store.list();
        let total = jobs.len();

        for (index, job) in jobs.iter().enumerate() {
            let source = job.source_path.display().to_string();

            match self
                .history
                .is_already_processed(&source, &config.prefix, output_mode.as_str())
                .await
            {
                Ok(true) => {
                    self.publisher
                        .publish(PipelineEvent::log(
                            EventLogLevel::Highlight,
                            format!(
                                "Skipped: {} (already processed with prefix '{}')",
                                job.file_name, config.prefix
                            ),
                        ))
                        .await;
                    let updated = store.update(&job.id, |j| {
                        j.status = JobStatus::Done;
                        j.progress = 1.0;
                    })?;
                    self.publisher
                        .publish(PipelineEvent::job_status(updated))
                        .await;
                    self.publisher
                        .publish(PipelineEvent::Progress { steps: 2 })
                        .await;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "history lookup failed");
                    self.publisher
                        .publish(PipelineEvent::log(
                            EventLogLevel::Warning,
                            format!("History lookup failed, processing anyway: {}", e),
                        ))
                        .await;
                }
            }

            // Transcribe.
            let updated = store.update(&job.id, |j| j.status = JobStatus::Transcribing)?;
            self.publisher
                .publish(PipelineEvent::job_status(updated))
                .await;

            let outcome = runner.run_transcription(&job.id, index, total).await?;
            self.publisher
                .publish(PipelineEvent::job_status(outcome.job().clone()))
                .await;
            if outcome.is_failed() {
                self.publish_job_error(outcome.job()).await;
                self.publisher
                    .publish(PipelineEvent::Progress { steps: 2 })
                    .await;
                continue;
            }
            self.publisher
                .publish(PipelineEvent::Progress { steps: 1 })
                .await;

            if output_mode.skips_export() {
                self.publisher
                    .publish(PipelineEvent::Progress { steps: 1 })
                    .await;
                continue;
            }

            // Title, with history-aware numbering.
            let (title, seq_number) = self.build_title(job, next_seq).await;

            // Export.
            let outcome = runner.run_export(&job.id, &title, index, total).await?;
            self.publisher
                .publish(PipelineEvent::job_status(outcome.job().clone()))
                .await;
            if outcome.is_failed() {
                self.publish_job_error(outcome.job()).await;
                self.publisher
                    .publish(PipelineEvent::Progress { steps: 1 })
                    .await;
                continue;
            }
            self.publisher
                .publish(PipelineEvent::Progress { steps: 1 })
                .await;

            let entry = HistoryEntry {
                source_path: source,
                prefix: config.prefix.clone(),
                naming_mode: config.naming_mode.as_str().to_string(),
                sequential_number: seq_number,
                output_title: title,
                output_mode: output_mode.as_str().to_string(),
                output_reference: Some(outcome.job().export_reference.clone()),
                language: Some(job.language.clone()),
            };
            if let Err(e) = self.history.record(&entry).await {
                warn!(job_id = %job.id, error = %e, "failed to record history");
                self.publisher
                    .publish(PipelineEvent::log(
                        EventLogLevel::Warning,
                        format!("History record failed: {}", e),
                    ))
                    .await;
            }

            if config.naming_mode == NamingMode::Sequential {
                next_seq += 1;
            }
        }

        Ok(())
    }

    /// Title for one job's export.
    ///
    /// Sequential mode consumes the running number; original mode derives
    /// the title from the file stem and suffixes `_2`, `_3`, ... while the
    /// history already knows the title.
    async fn build_title(&self, job: &Job, next_seq: i64) -> (String, Option<i64>) {
        let config = &self.config;
        let output_mode = config.output_mode();
        let stem = job
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.file_name.clone());

        match config.naming_mode {
            NamingMode::Sequential => (build_doc_title(config, &stem, next_seq), Some(next_seq)),
            NamingMode::Original => {
                let base = build_doc_title(config, &stem, 0);
                let mut title = base.clone();
                let mut suffix = 2;
                loop {
                    match self
                        .history
                        .output_title_exists(&title, output_mode.as_str())
                        .await
                    {
                        Ok(true) => {
                            title = format!("{}_{}", base, suffix);
                            suffix += 1;
                        }
                        Ok(false) => break,
                        Err(e) => {
                            warn!(error = %e, "title lookup failed; keeping current title");
                            break;
                        }
                    }
                }
                (title, None)
            }
        }
    }

    async fn publish_job_error(&self, job: &Job) {
        self.publisher
            .publish(PipelineEvent::log(
                EventLogLevel::Error,
                format!("Error: {}: {}", job.file_name, job.error),
            ))
            .await;
    }
}
