use std::{fmt, time::Duration};

use thiserror::Error;

/// Failures talking to the video-processing service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request to video service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from video service: {0}")]
    Decode(String),

    #[error("video service reported the task as failed: {message}")]
    TaskFailed { message: String },

    #[error("render completed without a download url")]
    MissingDownloadUrl,
}

impl ServiceError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

/// Pipeline stage a failure happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Upload,
    TemplateSelection,
    TaskCreation,
    TranscriptPolling,
    RenderPolling,
    Materialization,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::TemplateSelection => "template-selection",
            Self::TaskCreation => "task-creation",
            Self::TranscriptPolling => "transcript-polling",
            Self::RenderPolling => "render-polling",
            Self::Materialization => "materialization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{key} not found in configuration")]
    Configuration { key: &'static str },

    #[error("{stage} failed{}: {source}", format_status(.status))]
    Upstream {
        stage: Stage,
        status: Option<u16>,
        #[source]
        source: ServiceError,
    },

    #[error("video service returned no caption templates")]
    NoTemplates,

    #[error("{stage} timed out after {}s", whole_seconds(.waited))]
    Timeout { stage: Stage, waited: Duration },

    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

fn format_status(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" with upstream status {status}"))
        .unwrap_or_default()
}

fn whole_seconds(waited: &Duration) -> u64 {
    waited.as_secs()
}

impl PipelineError {
    pub fn upstream(stage: Stage, source: ServiceError) -> Self {
        Self::Upstream {
            stage,
            status: source.status_code(),
            source,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Configuration { .. } => None,
            Self::NoTemplates => Some(Stage::TemplateSelection),
            Self::Upstream { stage, .. } | Self::Timeout { stage, .. } | Self::Io { stage, .. } => {
                Some(*stage)
            }
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Technical detail for the `details` field of an HTTP failure body.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Upstream { source, .. } => Some(format!("{source:?}")),
            Self::Io { source, .. } => Some(format!("{:?}: {source}", source.kind())),
            Self::Timeout { waited, .. } => Some(format!(
                "condition not reached within {}ms",
                waited.as_millis()
            )),
            Self::Configuration { .. } | Self::NoTemplates => None,
        }
    }
}
