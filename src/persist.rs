//! Writing the corrected table and the lot snapshot.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::model::{CorrectionRow, Lot};

pub const PROCESSED_CSV: &str = "processed_tradeitems.csv";
pub const UPDATED_LOTS_JSON: &str = "updated_lots.json";

/// Writes the correction table as CSV, header first.
pub fn write_corrections<W: Write>(writer: W, rows: &[CorrectionRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    // serialize() only emits the header along with the first record
    if rows.is_empty() {
        csv_writer.write_record(CorrectionRow::HEADERS)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn write_corrections_file(path: &Path, rows: &[CorrectionRow]) -> Result<()> {
    write_corrections(BufWriter::new(File::create(path)?), rows)?;
    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes the lots as a pretty-printed JSON array.
pub fn write_lot_snapshot<W: Write>(mut writer: W, lots: &[Lot]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, lots)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn write_lot_snapshot_file(path: &Path, lots: &[Lot]) -> Result<()> {
    write_lot_snapshot(BufWriter::new(File::create(path)?), lots)?;
    info!("Wrote {} lots to {}", lots.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    #[test]
    fn test_write_corrections_format() {
        let rows = vec![CorrectionRow {
            orderable_id: "o1".to_string(),
            product_code: "P1".to_string(),
            lot_code: "L1".to_string(),
            trade_item_id: "t-new".to_string(),
        }];

        let mut output = Vec::new();
        write_corrections(&mut output, &rows).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(
            output_str,
            "orderableid,productCode,lotcode,tradeitemid\no1,P1,L1,t-new\n"
        );
    }

    #[test]
    fn test_write_corrections_empty_keeps_header() {
        let mut output = Vec::new();
        write_corrections(&mut output, &[]).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "orderableid,productCode,lotcode,tradeitemid\n"
        );
    }

    #[test]
    fn test_write_lot_snapshot() {
        let mut extra = Map::new();
        extra.insert("active".to_string(), json!(true));
        let lots = vec![Lot {
            id: "lot1".to_string(),
            lot_code: "L1".to_string(),
            trade_item_id: Some("t-new".to_string()),
            extra,
        }];

        let mut output = Vec::new();
        write_lot_snapshot(&mut output, &lots).unwrap();

        let parsed: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            parsed,
            json!([{"id": "lot1", "lotCode": "L1", "tradeItemId": "t-new", "active": true}])
        );
    }
}
