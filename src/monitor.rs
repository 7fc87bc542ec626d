//! One polling step of a unit watchdog
//!
//! Combines the log tail with the unit state so an agent can react to both in a single
//! tick. The cadence loop belongs to the caller.

use tracing::{info, warn};

use crate::{
    errors::AppError,
    journalctl::{LogEntry, LogReader},
    systemctl::{UnitControl, UnitStatus},
    tail::LogTail,
};

/// Outcome of one tick. Log and state results are independent: entries already consumed
/// from the journal are always delivered, even when the state check fails.
#[derive(Debug)]
pub struct TickReport {
    pub entries: Vec<LogEntry>,
    pub log_error: Option<AppError>,
    pub status: Result<UnitStatus, AppError>,
    /// `None` when no restart was attempted.
    pub restart: Option<Result<(), AppError>>,
}

impl TickReport {
    pub fn restarted(&self) -> bool {
        matches!(self.restart, Some(Ok(())))
    }
}

pub struct Monitor<R, C> {
    tail: LogTail<R>,
    control: C,
    restart_on_failure: bool,
}

impl<R: LogReader, C: UnitControl> Monitor<R, C> {
    pub fn new(tail: LogTail<R>, control: C, restart_on_failure: bool) -> Self {
        Self {
            tail,
            control,
            restart_on_failure,
        }
    }

    pub fn unit(&self) -> &str {
        self.tail.unit()
    }

    pub fn tail(&self) -> &LogTail<R> {
        &self.tail
    }

    pub async fn status(&self) -> Result<UnitStatus, AppError> {
        self.control.state(self.tail.unit()).await
    }

    /// Reads new log entries, then the unit state, restarting a failed unit when enabled.
    /// A failing journal read never skips the state check, and vice versa.
    pub async fn tick(&mut self) -> TickReport {
        let (entries, log_error) = match self.tail.poll().await {
            Ok(entries) => (entries, None),
            Err(mut err) => (err.take_partial_entries(), Some(err)),
        };

        let status = self.control.state(self.tail.unit()).await;

        let restart = match &status {
            Ok(status) if self.restart_on_failure && status.is_failed() => {
                warn!(unit = %self.tail.unit(), sub_state = %status.sub_state, "unit failed, restarting");
                let result = self.control.restart(self.tail.unit()).await;
                match &result {
                    Ok(()) => info!(unit = %self.tail.unit(), "unit restarted"),
                    Err(err) => warn!(unit = %self.tail.unit(), error = %err, "restart failed"),
                }
                Some(result)
            }
            _ => None,
        };

        TickReport {
            entries,
            log_error,
            status,
            restart,
        }
    }
}
