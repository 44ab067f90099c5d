//! Typed events streamed to progress subscribers.

use serde::{Deserialize, Serialize};

use super::job::Job;

/// Severity/rendering hint for `log` events.
///
/// These are display levels for the front ends, not tracing levels; a web UI
/// maps them to CSS classes, a terminal UI to markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventLogLevel {
    #[default]
    Info,
    /// Key actions (uploads, transcription starts).
    Highlight,
    Success,
    Warning,
    Error,
    /// Secondary detail relayed from providers.
    Dim,
}

/// One streamed event envelope.
///
/// Serialized with an internal `type` tag so the wire format matches the
/// subscriber contract: `job_status`, `log`, `progress`, `status_label`,
/// `done`, `error`, `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A job's status/progress/result changed; carries the full record.
    JobStatus { job: Job },
    /// Free-text diagnostic.
    Log {
        message: String,
        level: EventLogLevel,
    },
    /// Coarse-grained overall progress counter.
    Progress { steps: u32 },
    /// Human-readable phase description.
    StatusLabel { label: String },
    /// Session finished; terminal.
    Done,
    /// Session-fatal error; terminal, precedes `done`.
    Error { message: String },
    /// Keep-alive, no semantic content.
    Ping,
}

impl PipelineEvent {
    pub fn log(level: EventLogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            level,
        }
    }

    pub fn status_label(label: impl Into<String>) -> Self {
        Self::StatusLabel {
            label: label.into(),
        }
    }

    pub fn job_status(job: Job) -> Self {
        Self::JobStatus { job }
    }

    /// Wire name of this event's type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JobStatus { .. } => "job_status",
            Self::Log { .. } => "log",
            Self::Progress { .. } => "progress",
            Self::StatusLabel { .. } => "status_label",
            Self::Done => "done",
            Self::Error { .. } => "error",
            Self::Ping => "ping",
        }
    }

    /// True for the events that end a session's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}
