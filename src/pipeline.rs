//! The two run variants: live API and local dumps.
//!
//! Both return a `Result`; the binary decides what a failure means for the
//! process.

use log::{debug, error, info, warn};

use crate::auth::authenticate;
use crate::config::{Credentials, LotUpdateScope, Settings, Source};
use crate::error::Result;
use crate::http::{Headers, HttpClient, ReqwestTransport, RetryPolicy, Transport};
use crate::loader::{
    fetch_reference_data, load_local_reference_data, read_corrections_file, CORRECTIONS_FILE,
};
use crate::model::{Lot, LotReference};
use crate::persist::{
    write_corrections_file, write_lot_snapshot_file, PROCESSED_CSV, UPDATED_LOTS_JSON,
};
use crate::reconciler::{put_lot, ApiLotUpdater, LotUpdater, ReconcileReport, Reconciler};

/// Lots written back to the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    pub pushed: usize,
    pub failed: usize,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub report: ReconcileReport,
    pub push: PushOutcome,
}

/// Runs the variant selected by `settings` against the real API.
///
/// Credentials are read straight from the process environment; the caller
/// loads `.env` beforehand.
pub fn run(settings: &Settings) -> Result<RunSummary> {
    let client = HttpClient::new(ReqwestTransport::new(), RetryPolicy::default());

    match settings.source {
        Source::Api => {
            let credentials = Credentials::from_env()?;
            run_live(&client, &credentials, settings)
        }
        Source::Local => {
            let credentials = if settings.needs_credentials() {
                Some(Credentials::from_env()?)
            } else {
                None
            };
            run_local(&client, credentials.as_ref(), settings)
        }
    }
}

/// Reconciles against live API data.
///
/// Corrected lots are written back as they are found and the first failure
/// aborts the run. With [`LotUpdateScope::All`] the untouched lots are
/// written back afterwards as well.
pub fn run_live<T: Transport>(
    client: &HttpClient<T>,
    credentials: &Credentials,
    settings: &Settings,
) -> Result<RunSummary> {
    let base_url = credentials.base_url.as_str();
    let headers = authenticate(client, credentials)?;

    let corrections = read_corrections_file(&settings.data_dir.join(CORRECTIONS_FILE))?;
    let data = fetch_reference_data(client, base_url, &headers, &settings.inventory)?;

    let mut reconciler = Reconciler::new(data.orderables, data.lots, LotReference::Id);
    let mut staged: Vec<Lot> = Vec::new();
    let mut api_updater = ApiLotUpdater::new(client, base_url, &headers);
    let updater: &mut dyn LotUpdater = match settings.scope {
        LotUpdateScope::Disabled => &mut staged,
        LotUpdateScope::Changed | LotUpdateScope::All => &mut api_updater,
    };
    let corrected = reconciler.reconcile(&data.inventories, &corrections, updater)?;

    write_corrections_file(&settings.output_dir.join(PROCESSED_CSV), &corrected)?;

    let mut push = PushOutcome::default();
    match settings.scope {
        LotUpdateScope::Disabled => {
            info!("Lot updates disabled, {} lots left unchanged upstream", staged.len());
        }
        LotUpdateScope::Changed => push.pushed = api_updater.pushed(),
        LotUpdateScope::All => {
            let untouched: Vec<Lot> = reconciler
                .lots()
                .iter()
                .filter(|lot| !reconciler.corrected_lot_ids().contains(&lot.id))
                .cloned()
                .collect();
            push = push_lots(client, base_url, &headers, &untouched);
            push.pushed += api_updater.pushed();
        }
    }

    Ok(RunSummary {
        report: reconciler.report().clone(),
        push,
    })
}

/// Reconciles against the JSON dumps in the data directory.
///
/// The lot snapshot is written before anything is pushed, so it reflects
/// the corrections and not the outcome of the PUTs. Pushing needs
/// credentials; without them the push is skipped.
pub fn run_local<T: Transport>(
    client: &HttpClient<T>,
    credentials: Option<&Credentials>,
    settings: &Settings,
) -> Result<RunSummary> {
    let data = load_local_reference_data(&settings.data_dir)?;
    let corrections = read_corrections_file(&settings.data_dir.join(CORRECTIONS_FILE))?;

    let mut reconciler = Reconciler::new(data.orderables, data.lots, LotReference::Code);
    let mut staged: Vec<Lot> = Vec::new();
    let corrected = reconciler.reconcile(&data.inventories, &corrections, &mut staged)?;

    write_corrections_file(&settings.output_dir.join(PROCESSED_CSV), &corrected)?;
    write_lot_snapshot_file(&settings.output_dir.join(UPDATED_LOTS_JSON), reconciler.lots())?;

    let targets: Vec<Lot> = match settings.scope {
        LotUpdateScope::Disabled => Vec::new(),
        LotUpdateScope::Changed => reconciler
            .lots()
            .iter()
            .filter(|lot| reconciler.corrected_lot_ids().contains(&lot.id))
            .cloned()
            .collect(),
        LotUpdateScope::All => reconciler.lots().to_vec(),
    };
    debug!(
        "{} corrections staged for {} lots",
        staged.len(),
        reconciler.corrected_lot_ids().len()
    );

    let push = match credentials {
        _ if settings.scope == LotUpdateScope::Disabled => {
            info!("Lot updates disabled, skipping push");
            PushOutcome::default()
        }
        None => {
            warn!("No credentials supplied, skipping push of {} lots", targets.len());
            PushOutcome::default()
        }
        Some(credentials) => {
            let headers = authenticate(client, credentials)?;
            push_lots(client, &credentials.base_url, &headers, &targets)
        }
    };

    Ok(RunSummary {
        report: reconciler.report().clone(),
        push,
    })
}

/// Writes every lot back, logging and skipping individual failures.
fn push_lots<T: Transport>(
    client: &HttpClient<T>,
    base_url: &str,
    headers: &Headers,
    lots: &[Lot],
) -> PushOutcome {
    let mut outcome = PushOutcome::default();
    for lot in lots {
        match put_lot(client, base_url, headers, lot) {
            Ok(()) => outcome.pushed += 1,
            Err(e) => {
                error!("Failed to update lot {}: {}", lot.id, e);
                outcome.failed += 1;
            }
        }
    }
    info!(
        "Pushed {} of {} lots ({} failed)",
        outcome.pushed,
        lots.len(),
        outcome.failed
    );
    outcome
}
