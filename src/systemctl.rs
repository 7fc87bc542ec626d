use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    command::{validate_unit_name, CommandRunner},
    errors::AppError,
};

pub const DEFAULT_SYSTEMCTL_BIN: &str = "systemctl";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnitStatus {
    pub unit_file_state: String,
    pub active_state: String,
    pub sub_state: String,
}

impl UnitStatus {
    pub fn is_enabled(&self) -> bool {
        self.unit_file_state == "enabled" || self.unit_file_state == "enabled-runtime"
    }

    pub fn is_active(&self) -> bool {
        self.active_state == "active"
    }

    pub fn is_failed(&self) -> bool {
        self.active_state == "failed"
    }
}

#[async_trait]
pub trait UnitControl: Send + Sync {
    /// Unit file, active and sub state of a fully qualified unit.
    async fn state(&self, unit: &str) -> Result<UnitStatus, AppError>;

    /// Restarts the unit. A non-zero exit code hints at the cause, see systemctl(1).
    async fn restart(&self, unit: &str) -> Result<(), AppError>;
}

pub struct Systemctl {
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl Systemctl {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

#[async_trait]
impl UnitControl for Systemctl {
    async fn state(&self, unit: &str) -> Result<UnitStatus, AppError> {
        validate_unit_name(unit)?;

        let args = vec!["show".to_string(), unit.to_string(), "--no-pager".to_string()];
        let stdout = match self.runner.run(&self.binary, &args).await {
            Ok(stdout) => stdout,
            Err(err @ AppError::CommandFailed { .. }) => {
                return Err(AppError::state_unavailable_because(unit, err))
            }
            Err(err) => return Err(err),
        };
        parse_unit_status(&self.binary, unit, &stdout)
    }

    async fn restart(&self, unit: &str) -> Result<(), AppError> {
        validate_unit_name(unit)?;

        let args = vec!["restart".to_string(), unit.to_string()];
        self.runner.run(&self.binary, &args).await?;
        Ok(())
    }
}

pub fn parse_unit_status(program: &str, unit: &str, stdout: &[u8]) -> Result<UnitStatus, AppError> {
    let text = std::str::from_utf8(stdout)
        .map_err(|err| AppError::parse(program, format!("output is not valid UTF-8: {err}")))?;

    let mut unit_file_state = None;
    let mut active_state = None;
    let mut sub_state = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(AppError::parse(
                program,
                format!("expected key=value, got {line:?}"),
            ));
        };

        match key {
            "UnitFileState" => unit_file_state = Some(value),
            "ActiveState" => active_state = Some(value),
            "SubState" => sub_state = Some(value),
            _ => {}
        }
    }

    match (unit_file_state, active_state, sub_state) {
        (Some(unit_file_state), Some(active_state), Some(sub_state))
            if !unit_file_state.is_empty() && !active_state.is_empty() && !sub_state.is_empty() =>
        {
            Ok(UnitStatus {
                unit_file_state: unit_file_state.to_string(),
                active_state: active_state.to_string(),
                sub_state: sub_state.to_string(),
            })
        }
        _ => Err(AppError::state_unavailable(unit)),
    }
}
