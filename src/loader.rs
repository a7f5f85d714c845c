//! Loading the reference collections and the correction table.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::info;
use serde::de::DeserializeOwned;

use crate::config::InventoryQuery;
use crate::error::{ReconcileError, Result};
use crate::http::{api_url, api_url_with_query, Headers, HttpClient, Transport};
use crate::model::{parse_collection, CorrectionRow, Lot, Orderable, PhysicalInventory};

pub const ORDERABLES_FILE: &str = "orderables.json";
pub const LOTS_FILE: &str = "lots.json";
pub const INVENTORIES_FILE: &str = "physicalInventories.json";
pub const CORRECTIONS_FILE: &str = "orderables_tradeItems_lotCode.csv";

/// The three collections the reconciler joins against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub orderables: Vec<Orderable>,
    pub lots: Vec<Lot>,
    pub inventories: Vec<PhysicalInventory>,
}

/// Fetches the reference collections from the live API.
///
/// Each collection is requested independently; nothing ties the three
/// responses to the same point in time.
pub fn fetch_reference_data<T: Transport>(
    client: &HttpClient<T>,
    base_url: &str,
    headers: &Headers,
    query: &InventoryQuery,
) -> Result<ReferenceData> {
    let orderables = parse_collection(client.get(&api_url(base_url, "/api/orderables"), headers)?)?;
    let lots = parse_collection(client.get(&api_url(base_url, "/api/lots"), headers)?)?;

    let inventories_url = api_url_with_query(
        base_url,
        "/api/physicalInventories",
        &[
            ("facility", query.facility.as_str()),
            ("isDraft", query.is_draft.as_str()),
            ("program", query.program.as_str()),
        ],
    )?;
    let inventories = parse_collection(client.get(&inventories_url, headers)?)?;

    let data = ReferenceData {
        orderables,
        lots,
        inventories,
    };
    log_loaded("API", &data);
    Ok(data)
}

/// Reads the reference collections from JSON dumps in `dir`.
pub fn load_local_reference_data(dir: &Path) -> Result<ReferenceData> {
    let data = ReferenceData {
        orderables: read_json_collection(&dir.join(ORDERABLES_FILE))?,
        lots: read_json_collection(&dir.join(LOTS_FILE))?,
        inventories: read_json_collection(&dir.join(INVENTORIES_FILE))?,
    };
    log_loaded(&dir.display().to_string(), &data);
    Ok(data)
}

fn log_loaded(origin: &str, data: &ReferenceData) {
    info!(
        "Loaded {} orderables, {} lots, {} physical inventories from {}",
        data.orderables.len(),
        data.lots.len(),
        data.inventories.len(),
        origin
    );
}

fn read_json_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(open_input(path)?);
    parse_collection(serde_json::from_reader(reader)?)
}

/// Opens an input file, reporting a missing file by path.
fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ReconcileError::MissingFile {
            path: path.to_path_buf(),
        },
        _ => ReconcileError::Io(e),
    })
}

/// Reads the correction table. Whitespace around fields is trimmed and a
/// malformed row fails the whole read.
pub fn read_corrections<R: Read>(reader: R) -> Result<Vec<CorrectionRow>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let rows = csv_reader
        .deserialize::<CorrectionRow>()
        .collect::<csv::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Reads the correction table from `path`.
pub fn read_corrections_file(path: &Path) -> Result<Vec<CorrectionRow>> {
    let rows = read_corrections(BufReader::new(open_input(path)?))?;
    info!("Read {} correction rows from {}", rows.len(), path.display());
    Ok(rows)
}
