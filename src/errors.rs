use std::time::Duration;

use thiserror::Error;

use crate::journalctl::LogEntry;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid unit name {unit:?}: {message}")]
    InvalidUnit { unit: String, message: &'static str },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not exit within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {}: {stderr}", exit_code_label(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("unparsable output from {program}: {message}")]
    Parse { program: String, message: String },
    #[error("state unavailable for unit {unit}{}", cause_suffix(.source))]
    StateUnavailable {
        unit: String,
        #[source]
        source: Option<Box<AppError>>,
    },
    #[error("malformed journal entry on line {line}: {source}")]
    MalformedEntry {
        line: usize,
        entries: Vec<LogEntry>,
        #[source]
        source: serde_json::Error,
    },
}

impl AppError {
    pub fn invalid_unit(unit: impl Into<String>, message: &'static str) -> Self {
        Self::InvalidUnit {
            unit: unit.into(),
            message,
        }
    }

    pub fn parse(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn state_unavailable(unit: impl Into<String>) -> Self {
        Self::StateUnavailable {
            unit: unit.into(),
            source: None,
        }
    }

    /// Wraps the failure of the status query itself, keeping its diagnostics as the source.
    pub fn state_unavailable_because(unit: impl Into<String>, cause: AppError) -> Self {
        Self::StateUnavailable {
            unit: unit.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// A deadline overrun may succeed on the next attempt; every other
    /// failure is reported as-is and retrying it is pointless.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Entries decoded before a malformed journal line was hit.
    pub fn partial_entries(&self) -> &[LogEntry] {
        match self {
            Self::MalformedEntry { entries, .. } => entries,
            _ => &[],
        }
    }

    /// Moves the partial entries out, leaving the error itself intact.
    pub fn take_partial_entries(&mut self) -> Vec<LogEntry> {
        match self {
            Self::MalformedEntry { entries, .. } => std::mem::take(entries),
            _ => Vec::new(),
        }
    }

    pub fn into_partial_entries(self) -> Vec<LogEntry> {
        match self {
            Self::MalformedEntry { entries, .. } => entries,
            _ => Vec::new(),
        }
    }
}

fn cause_suffix(source: &Option<Box<AppError>>) -> String {
    match source {
        Some(source) => format!(": {source}"),
        None => String::new(),
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "signal".to_string(),
    }
}
