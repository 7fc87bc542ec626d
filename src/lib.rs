use std::sync::Arc;

pub mod command;
pub mod config;
pub mod errors;
pub mod journalctl;
pub mod logging;
pub mod monitor;
pub mod systemctl;
pub mod tail;

use command::{unit_name, CommandRunner, ProcessRunner};
use config::Config;
use errors::AppError;
use journalctl::{Journalctl, LogEntry};
use monitor::Monitor;
use systemctl::Systemctl;
use tail::LogTail;

/// Wires the process-backed adapters for the configured unit and seeks the log tail to
/// the newest journal entry. Returns the monitor together with that entry.
pub async fn build_monitor(
    config: &Config,
) -> Result<(Monitor<Journalctl, Systemctl>, LogEntry), AppError> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.command_timeout));
    let unit = unit_name(&config.unit);

    let journalctl = Journalctl::new(config.journalctl_bin.clone(), runner.clone());
    let systemctl = Systemctl::new(config.systemctl_bin.clone(), runner);

    let (tail, last) = LogTail::from_end(journalctl, unit).await?;
    Ok((Monitor::new(tail, systemctl, config.restart_on_failure), last))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(systemctl_bin: &str, journalctl_bin: &str) -> Config {
        Config {
            unit: "nginx".to_string(),
            systemctl_bin: systemctl_bin.to_string(),
            journalctl_bin: journalctl_bin.to_string(),
            command_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
            restart_on_failure: false,
        }
    }

    #[tokio::test]
    async fn silent_journal_starts_from_empty_entry() {
        let (monitor, last) = build_monitor(&config("true", "true"))
            .await
            .expect("monitor should build");

        assert!(last.is_empty());
        assert_eq!(monitor.unit(), "nginx.service");
        assert_eq!(monitor.tail().cursor(), "");
    }

    #[tokio::test]
    async fn empty_show_output_is_unavailable_state() {
        let (mut monitor, _) = build_monitor(&config("true", "true"))
            .await
            .expect("monitor should build");

        let report = monitor.tick().await;
        assert!(report.entries.is_empty());
        assert!(report.log_error.is_none());
        assert!(matches!(report.status, Err(AppError::StateUnavailable { .. })));
    }

    #[tokio::test]
    async fn failing_journal_tool_surfaces_exit_code() {
        let error = match build_monitor(&config("true", "false")).await {
            Ok(_) => panic!("expected journal failure"),
            Err(error) => error,
        };

        assert!(matches!(error, AppError::CommandFailed { code: Some(1), .. }));
    }
}
