use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFailureKind {
    Connect,
    Timeout,
    Transport,
    Decode,
    NotFound,
    Forbidden,
}

impl HostFailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            HostFailureKind::Connect => "connection failed",
            HostFailureKind::Timeout => "timed out",
            HostFailureKind::Transport => "transport error",
            HostFailureKind::Decode => "malformed response",
            HostFailureKind::NotFound => "not found",
            HostFailureKind::Forbidden => "forbidden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub host: String,
    pub kind: HostFailureKind,
    pub message: String,
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("API error {status} from {host}: {body}")]
    Status {
        host: String,
        status: u16,
        body: String,
    },
    #[error("{}", last_message(.attempts))]
    Exhausted { attempts: Vec<HostFailure> },
}

impl AnalysisError {
    pub fn attempts(&self) -> &[HostFailure] {
        match self {
            AnalysisError::Exhausted { attempts } => attempts,
            AnalysisError::Status { .. } => &[],
        }
    }

    pub fn saw_forbidden(&self) -> bool {
        self.attempts()
            .iter()
            .any(|attempt| attempt.kind == HostFailureKind::Forbidden)
    }
}

fn last_message(attempts: &[HostFailure]) -> String {
    attempts
        .last()
        .map(|attempt| attempt.message.clone())
        .unwrap_or_else(|| "No API base configured".to_string())
}
