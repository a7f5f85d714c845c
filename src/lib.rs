//! # Lot Reconciler
//!
//! Repairs lot / trade-item mismatches left behind by a bulk master-data
//! upload. A run loads orderables, lots and physical inventories (from the
//! inventory API or from local JSON dumps), joins them against a correction
//! table exported from the database, and writes corrected trade items back.
//!
//! ## Flow
//!
//! - **Credentials** from the environment (`.env` supported)
//! - **Token** via the password grant
//! - **Reference data** from the API or from `data/*.json`
//! - **Reconcile** line items without a lot against the correction table
//! - **Persist** `processed_tradeitems.csv`, `updated_lots.json`, and lot PUTs
//!
//! ## Example
//!
//! ```no_run
//! use lot_reconciler::{LotReference, Reconciler};
//! use lot_reconciler::loader::{load_local_reference_data, read_corrections_file};
//! use std::path::Path;
//!
//! let data = load_local_reference_data(Path::new("data")).unwrap();
//! let corrections =
//!     read_corrections_file(Path::new("data/orderables_tradeItems_lotCode.csv")).unwrap();
//!
//! let mut reconciler = Reconciler::new(data.orderables, data.lots, LotReference::Code);
//! let mut staged: Vec<lot_reconciler::Lot> = Vec::new();
//! let corrected = reconciler
//!     .reconcile(&data.inventories, &corrections, &mut staged)
//!     .unwrap();
//! println!("{} rows, {} lots corrected", corrected.len(), staged.len());
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod loader;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod reconciler;

pub use auth::{authenticate, bearer_headers, get_token};
pub use config::{load_credentials, Credentials, InventoryQuery, LotUpdateScope, Settings, Source};
pub use error::{HttpError, ReconcileError, Result};
pub use http::{Headers, HttpClient, HttpMethod, RequestBody, ReqwestTransport, RetryPolicy, Transport};
pub use loader::ReferenceData;
pub use model::{CorrectionRow, LineItem, Lot, LotReference, Orderable, PhysicalInventory};
pub use pipeline::{run, run_live, run_local, PushOutcome, RunSummary};
pub use reconciler::{ApiLotUpdater, LotUpdater, ReconcileReport, Reconciler};
