//! Job model: one unit of work tracking one input file.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job status.
///
/// Statuses only move forward: `pending` is initial, `done` and `failed`
/// are terminal, and `failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be processed.
    Pending,
    /// Transcription stage in flight.
    Transcribing,
    /// Export stage in flight.
    Exporting,
    /// Finished successfully.
    Done,
    /// Finished with an error recorded on the job.
    Failed,
}

impl JobStatus {
    /// True for `done` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Allowed forward edges of the job state machine.
    ///
    /// `pending -> done` covers the history skip; `transcribing -> done`
    /// covers output modes without an export stage; `pending -> failed`
    /// covers the session-fatal bulk fail.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Transcribing)
                | (Pending, Done)
                | (Pending, Failed)
                | (Transcribing, Exporting)
                | (Transcribing, Done)
                | (Transcribing, Failed)
                | (Exporting, Done)
                | (Exporting, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Transcribing => "transcribing",
            Self::Exporting => "exporting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work for one input file.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Job {
    /// Unique job id, stable for the job's lifetime.
    pub id: String,
    /// Location of the input media; the pipeline only reads it.
    #[schema(value_type = String)]
    pub source_path: PathBuf,
    /// Display name of the input file.
    pub file_name: String,
    /// Requested transcription language, immutable after creation.
    pub language: String,
    /// Current pipeline state.
    pub status: JobStatus,
    /// Fraction in `[0, 1]`, non-decreasing while the job is active.
    pub progress: f32,
    /// Transcript text; set only after transcription succeeds.
    pub transcript: String,
    /// Document URL or local output path; set only when the job is done.
    pub export_reference: String,
    /// Failure reason; set only when the job failed.
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn new(
        id: String,
        source_path: PathBuf,
        file_name: String,
        language: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_path,
            file_name,
            language,
            status: JobStatus::Pending,
            progress: 0.0,
            transcript: String::new(),
            export_reference: String::new(),
            error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(JobStatus::Pending, JobStatus::Transcribing, true)]
    #[case(JobStatus::Pending, JobStatus::Done, true)]
    #[case(JobStatus::Pending, JobStatus::Failed, true)]
    #[case(JobStatus::Transcribing, JobStatus::Exporting, true)]
    #[case(JobStatus::Transcribing, JobStatus::Done, true)]
    #[case(JobStatus::Transcribing, JobStatus::Failed, true)]
    #[case(JobStatus::Exporting, JobStatus::Done, true)]
    #[case(JobStatus::Exporting, JobStatus::Failed, true)]
    #[case(JobStatus::Pending, JobStatus::Exporting, false)]
    #[case(JobStatus::Exporting, JobStatus::Transcribing, false)]
    #[case(JobStatus::Done, JobStatus::Pending, false)]
    #[case(JobStatus::Done, JobStatus::Failed, false)]
    #[case(JobStatus::Failed, JobStatus::Transcribing, false)]
    fn test_transition_edges(
        #[case] from: JobStatus,
        #[case] to: JobStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Exporting.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Transcribing).unwrap(),
            "\"transcribing\""
        );
    }
}
