//! Operator entry point for the correspondence core.
//!
//! # Responsibility
//! - Without arguments, print core linkage info.
//! - With a config path, open the store and run one status sweep.
//!
//! Exit code is non-zero when configuration, store or sweep fails.

use corrtrack_core::{
    init_from_config, open_db, CorrespondenceService, CoreConfig, SqliteAuditRepository,
    SqliteCorrespondenceRepository, SqliteNotificationRepository, StatusSweeper,
};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        println!("corrtrack_core ping={}", corrtrack_core::ping());
        println!("corrtrack_core version={}", corrtrack_core::core_version());
        return ExitCode::SUCCESS;
    };

    match run_sweep(&config_path) {
        Ok(report) => {
            println!(
                "status_sweep selected={} advanced={} skipped={}",
                report.selected, report.advanced, report.skipped
            );
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_sweep module=cli status=error error={message}");
            eprintln!("corrtrack: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run_sweep(config_path: &str) -> Result<corrtrack_core::SweepReport, String> {
    let config = CoreConfig::load(config_path).map_err(|err| err.to_string())?;
    init_from_config(&config)?;

    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let audit = SqliteAuditRepository::new(&conn);
    let notifier = SqliteNotificationRepository::new(&conn);
    let service = CorrespondenceService::new(repo, audit, notifier)
        .with_engine_options(config.engine_options())
        .with_concurrency(config.concurrency);

    let now = service.now_ms();
    StatusSweeper::new(&service)
        .sweep_with_report(now)
        .map_err(|err| err.to_string())
}
