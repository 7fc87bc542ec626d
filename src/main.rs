use systemd_tail::{build_monitor, config::Config, logging, systemctl::UnitStatus};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let (mut monitor, last) = build_monitor(&config).await?;

    info!(
        unit = %monitor.unit(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        restart_on_failure = config.restart_on_failure,
        "monitor starting"
    );
    if !last.is_empty() {
        println!("{last}");
    }

    let mut last_status: Option<UnitStatus> = match monitor.status().await {
        Ok(status) => {
            log_status(monitor.unit(), &status);
            Some(status)
        }
        Err(err) => {
            warn!(unit = %monitor.unit(), error = %err, "unit state unavailable");
            None
        }
    };

    let mut interval = tokio::time::interval(config.poll_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!(cursor = %monitor.tail().cursor(), "monitor stopping");
                return Ok(());
            }
        }

        let report = monitor.tick().await;
        for entry in &report.entries {
            println!("{entry}");
        }

        match report.log_error {
            Some(err) if err.is_retryable() => {
                warn!(error = %err, "journal read timed out, retrying next tick");
            }
            Some(err) => error!(error = %err, "journal read failed"),
            None => {}
        }

        match report.status {
            Ok(status) => {
                if last_status.as_ref() != Some(&status) {
                    log_status(monitor.unit(), &status);
                    last_status = Some(status);
                }
            }
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "state query timed out, retrying next tick");
            }
            Err(err) => error!(error = %err, "state query failed"),
        }
    }
}

fn log_status(unit: &str, status: &UnitStatus) {
    info!(
        unit,
        unit_file_state = %status.unit_file_state,
        active_state = %status.active_state,
        sub_state = %status.sub_state,
        "unit state"
    );
}
