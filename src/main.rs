//! Lot Reconciler CLI
//!
//! Fixes lot / trade-item mismatches after a master-data upload. Takes no
//! arguments; everything is configured through the environment.
//!
//! A run that fails at any stage logs the error and stops early. The exit
//! status stays 0 unless `RECONCILE_FAIL_EXIT=1` is set.
//!
//! # Usage
//!
//! ```bash
//! RECONCILE_SOURCE=local LOT_UPDATE_SCOPE=none cargo run
//! ```
//!
//! # Environment Variables
//!
//! - `USERNAME`, `PASSWORD`, `BASE_URL`, `AUTH_HEADER`: API credentials
//! - `PHY_INV_FACILITY_ID`, `PHY_INV_IS_DRAFT`, `PHY_INV_PROGRAM_ID`: inventory filters
//! - `RECONCILE_SOURCE`: `api` (default) or `local`
//! - `LOT_UPDATE_SCOPE`: `changed` (default), `all` or `none`
//! - `RECONCILE_FAIL_EXIT`: set to `1` to exit with status 1 on failure
//! - `RUST_LOG`: logging verbosity (defaults to `info`)

use lot_reconciler::config::{self, FAIL_EXIT};
use lot_reconciler::{pipeline, Result, Settings};
use log::{error, info};
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    config::load_dotenv();

    if let Err(e) = run() {
        error!("{}", e);
        if config::env_flag(FAIL_EXIT) {
            process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let settings = Settings::from_env()?;
    info!(
        "Reconciling from {:?} source, lot update scope {:?}",
        settings.source, settings.scope
    );

    let summary = pipeline::run(&settings)?;

    info!(
        "Done: {} line items, {} without lot, {} rows and {} lots corrected, {} lots pushed ({} failed)",
        summary.report.line_items,
        summary.report.unresolved,
        summary.report.rows_corrected,
        summary.report.lots_corrected,
        summary.push.pushed,
        summary.push.failed
    );
    Ok(())
}
