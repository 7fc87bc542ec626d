//! External process execution
//!
//! Every adapter operation funnels through [`CommandRunner::run`]: spawn a tool with an
//! argument list, wait for it under a deadline, and hand back the complete stdout.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::AppError;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, AppError>;
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, AppError> {
        debug!(program, ?args, "spawning command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AppError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Dropping the timed-out future drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| AppError::Spawn {
                program: program.to_string(),
                source,
            })?,
            Err(_) => {
                warn!(program, timeout_ms = self.timeout.as_millis() as u64, "command timed out");
                return Err(AppError::Timeout {
                    program: program.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        debug!(
            program,
            status = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            "command finished"
        );

        if !output.status.success() {
            return Err(AppError::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Qualifies a bare service name as a unit name (`nginx` -> `nginx.service`).
pub fn unit_name(service: &str) -> String {
    if service.ends_with(".service") {
        service.to_string()
    } else {
        format!("{service}.service")
    }
}

pub fn validate_unit_name(unit: &str) -> Result<(), AppError> {
    if unit.trim().is_empty() {
        return Err(AppError::invalid_unit(unit, "unit name must not be empty"));
    }

    if unit.starts_with('-') {
        return Err(AppError::invalid_unit(
            unit,
            "unit name must not start with a dash",
        ));
    }

    if !unit.chars().all(|character| {
        character.is_ascii_alphanumeric()
            || character == '-'
            || character == '_'
            || character == '@'
            || character == ':'
            || character == '.'
            || character == '\\'
    }) {
        return Err(AppError::invalid_unit(
            unit,
            "unit must contain only alphanumeric characters, dashes, underscores, dots, @, : and \\",
        ));
    }

    Ok(())
}
