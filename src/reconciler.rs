//! Core reconciliation of the correction table against reference data.
//!
//! For every inventory line item without a lot, the correction rows for its
//! orderable must carry the orderable's authoritative trade item. Rows that
//! disagree are corrected, and so is every lot with the row's lot code.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info, warn};

use crate::error::{ReconcileError, Result};
use crate::http::{api_url, Headers, HttpClient, Transport};
use crate::model::{CorrectionRow, Lot, LotReference, Orderable, PhysicalInventory};

/// Receives each lot right after its trade item was corrected.
pub trait LotUpdater {
    fn update_lot(&mut self, lot: &Lot) -> Result<()>;
}

/// Stages corrected lots for later instead of writing them anywhere.
impl LotUpdater for Vec<Lot> {
    fn update_lot(&mut self, lot: &Lot) -> Result<()> {
        self.push(lot.clone());
        Ok(())
    }
}

/// Writes each corrected lot back with `PUT /api/lots/{id}`.
pub struct ApiLotUpdater<'a, T> {
    client: &'a HttpClient<T>,
    base_url: &'a str,
    headers: &'a Headers,
    pushed: usize,
}

impl<'a, T: Transport> ApiLotUpdater<'a, T> {
    pub fn new(client: &'a HttpClient<T>, base_url: &'a str, headers: &'a Headers) -> Self {
        ApiLotUpdater {
            client,
            base_url,
            headers,
            pushed: 0,
        }
    }

    /// Number of PUTs that succeeded. A lot corrected twice counts twice.
    pub fn pushed(&self) -> usize {
        self.pushed
    }
}

impl<T: Transport> LotUpdater for ApiLotUpdater<'_, T> {
    fn update_lot(&mut self, lot: &Lot) -> Result<()> {
        put_lot(self.client, self.base_url, self.headers, lot)?;
        self.pushed += 1;
        Ok(())
    }
}

/// Sends a single lot to the API.
pub fn put_lot<T: Transport>(
    client: &HttpClient<T>,
    base_url: &str,
    headers: &Headers,
    lot: &Lot,
) -> Result<()> {
    let url = api_url(base_url, &format!("/api/lots/{}", lot.id));
    client.put_json(&url, headers, serde_json::to_value(lot)?)?;
    debug!("Updated lot {} ({})", lot.id, lot.lot_code);
    Ok(())
}

/// Counters describing what a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Line items looked at across all inventories.
    pub line_items: usize,
    /// Line items without a lot reference.
    pub unresolved: usize,
    /// Correction rows whose trade item was replaced.
    pub rows_corrected: usize,
    /// Lots whose trade item was replaced.
    pub lots_corrected: usize,
}

/// Joins correction rows against orderables and lots.
///
/// Orderables are looked up by `id` against the row's `orderableid`; an id
/// carried by more than one orderable is a data error.
pub struct Reconciler {
    orderables: Vec<Orderable>,
    /// Orderable positions keyed by id.
    index: HashMap<String, Vec<usize>>,
    lots: Vec<Lot>,
    reference: LotReference,
    corrected_lots: BTreeSet<String>,
    report: ReconcileReport,
}

impl Reconciler {
    pub fn new(orderables: Vec<Orderable>, lots: Vec<Lot>, reference: LotReference) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, orderable) in orderables.iter().enumerate() {
            index.entry(orderable.id.clone()).or_default().push(position);
        }

        Reconciler {
            orderables,
            index,
            lots,
            reference,
            corrected_lots: BTreeSet::new(),
            report: ReconcileReport::default(),
        }
    }

    /// Finds the single orderable with the given id.
    fn find_orderable(&self, id: &str) -> Result<Option<&Orderable>> {
        match self.index.get(id).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([position]) => Ok(self.orderables.get(*position)),
            Some(positions) => Err(ReconcileError::DuplicateOrderable {
                id: id.to_string(),
                count: positions.len(),
            }),
        }
    }

    /// Runs one pass over the inventories and returns the corrected table.
    ///
    /// `corrections` is left untouched; the returned table is a corrected
    /// copy in the same row order. Each corrected lot is handed to `updater`
    /// as soon as it changes, and an updater error stops the pass.
    pub fn reconcile(
        &mut self,
        inventories: &[PhysicalInventory],
        corrections: &[CorrectionRow],
        updater: &mut dyn LotUpdater,
    ) -> Result<Vec<CorrectionRow>> {
        let mut corrected = corrections.to_vec();

        for inventory in inventories {
            for line_item in &inventory.line_items {
                self.report.line_items += 1;
                if !line_item.is_unresolved(self.reference) {
                    continue;
                }
                self.report.unresolved += 1;

                let mut matched = false;
                for (row_idx, row) in corrections.iter().enumerate() {
                    if row.orderable_id != line_item.orderable_id {
                        continue;
                    }
                    matched = true;

                    let authoritative = match self.find_orderable(&row.orderable_id)? {
                        Some(orderable) => match orderable.trade_item() {
                            Some(trade_item) => trade_item.to_string(),
                            None => {
                                debug!("Orderable {} has no trade item, skipping", orderable.id);
                                continue;
                            }
                        },
                        None => {
                            warn!(
                                "No orderable with id {} for lot code {}, skipping",
                                row.orderable_id, row.lot_code
                            );
                            continue;
                        }
                    };

                    if corrected[row_idx].trade_item_id == authoritative {
                        continue;
                    }
                    info!(
                        "Orderable {}: trade item {} -> {}",
                        row.orderable_id, corrected[row_idx].trade_item_id, authoritative
                    );
                    corrected[row_idx].trade_item_id = authoritative.clone();
                    self.report.rows_corrected += 1;

                    for lot in self.lots.iter_mut() {
                        if lot.lot_code != row.lot_code
                            || lot.trade_item_id.as_deref() == Some(authoritative.as_str())
                        {
                            continue;
                        }
                        debug!(
                            "Lot {} ({}): trade item {:?} -> {}",
                            lot.id, lot.lot_code, lot.trade_item_id, authoritative
                        );
                        lot.trade_item_id = Some(authoritative.clone());
                        self.corrected_lots.insert(lot.id.clone());
                        self.report.lots_corrected += 1;
                        updater.update_lot(lot)?;
                    }
                }

                if !matched {
                    debug!(
                        "No correction row for orderable {}",
                        line_item.orderable_id
                    );
                }
            }
        }

        Ok(corrected)
    }

    /// All lots, with corrections applied.
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Ids of the lots corrected so far.
    pub fn corrected_lot_ids(&self) -> &BTreeSet<String> {
        &self.corrected_lots
    }

    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn orderable(id: &str, trade_item: &str) -> Orderable {
        serde_json::from_value(json!({
            "id": id,
            "productCode": format!("P-{id}"),
            "identifiers": {"tradeItem": trade_item}
        }))
        .unwrap()
    }

    fn lot(id: &str, lot_code: &str, trade_item: &str) -> Lot {
        Lot {
            id: id.to_string(),
            lot_code: lot_code.to_string(),
            trade_item_id: Some(trade_item.to_string()),
            extra: Map::new(),
        }
    }

    fn row(orderable_id: &str, lot_code: &str, trade_item: &str) -> CorrectionRow {
        CorrectionRow {
            orderable_id: orderable_id.to_string(),
            product_code: format!("P-{orderable_id}"),
            lot_code: lot_code.to_string(),
            trade_item_id: trade_item.to_string(),
        }
    }

    fn inventory(items: serde_json::Value) -> PhysicalInventory {
        serde_json::from_value(json!({ "lineItems": items })).unwrap()
    }

    #[test]
    fn test_mismatch_corrects_row_and_lot() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old"), lot("lot2", "L2", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": null}]))];
        let mut staged: Vec<Lot> = Vec::new();

        let corrected = reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(corrected[0].trade_item_id, "t-new");
        assert_eq!(corrections[0].trade_item_id, "t-old");
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].id, "lot1");
        assert_eq!(staged[0].trade_item_id.as_deref(), Some("t-new"));
        assert_eq!(reconciler.lots()[1].trade_item_id.as_deref(), Some("t-old"));
        assert!(reconciler.corrected_lot_ids().contains("lot1"));
        assert_eq!(
            *reconciler.report(),
            ReconcileReport {
                line_items: 1,
                unresolved: 1,
                rows_corrected: 1,
                lots_corrected: 1,
            }
        );
    }

    #[test]
    fn test_no_mismatch_changes_nothing() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t1")],
            vec![lot("lot1", "L1", "t-stale")],
            LotReference::Id,
        );
        let corrections = vec![row("o1", "L1", "t1")];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": null}]))];
        let mut staged: Vec<Lot> = Vec::new();

        let corrected = reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(corrected, corrections);
        assert!(staged.is_empty());
        assert_eq!(reconciler.report().rows_corrected, 0);
    }

    #[test]
    fn test_line_item_with_lot_is_ignored() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": "lot1"}]))];
        let mut staged: Vec<Lot> = Vec::new();

        let corrected = reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(corrected[0].trade_item_id, "t-old");
        assert!(staged.is_empty());
        assert_eq!(reconciler.report().unresolved, 0);
    }

    #[test]
    fn test_local_reference_checks_lot_code() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old")],
            LotReference::Code,
        );
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![inventory(json!([
            {"orderableId": "o1", "lotId": null, "lotCode": "L1"},
            {"orderableId": "o1", "lotId": "lot1", "lotCode": null}
        ]))];
        let mut staged: Vec<Lot> = Vec::new();

        reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(reconciler.report().line_items, 2);
        assert_eq!(reconciler.report().unresolved, 1);
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn test_every_matching_row_is_corrected() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old"), lot("lot2", "L2", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![
            row("o1", "L1", "t-old"),
            row("o2", "L9", "t-other"),
            row("o1", "L2", "t-old"),
        ];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": null}]))];
        let mut staged: Vec<Lot> = Vec::new();

        let corrected = reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(corrected[0].trade_item_id, "t-new");
        assert_eq!(corrected[1].trade_item_id, "t-other");
        assert_eq!(corrected[2].trade_item_id, "t-new");
        assert_eq!(staged.len(), 2);
    }

    #[test]
    fn test_repeated_line_items_correct_once() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![
            inventory(json!([{"orderableId": "o1", "lotId": null}])),
            inventory(json!([{"orderableId": "o1", "lotId": null}])),
        ];
        let mut staged: Vec<Lot> = Vec::new();

        reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(staged.len(), 1);
        assert_eq!(reconciler.report().rows_corrected, 1);
        assert_eq!(reconciler.report().unresolved, 2);
    }

    #[test]
    fn test_missing_row_or_orderable_is_skipped() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![row("o2", "L1", "t-old")];
        let inventories = vec![inventory(json!([
            {"orderableId": "o3", "lotId": null},
            {"orderableId": "o2", "lotId": null}
        ]))];
        let mut staged: Vec<Lot> = Vec::new();

        let corrected = reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(corrected, corrections);
        assert!(staged.is_empty());
    }

    #[test]
    fn test_duplicate_orderable_id_is_an_error() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-a"), orderable("o1", "t-b")],
            vec![lot("lot1", "L1", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": null}]))];
        let mut staged: Vec<Lot> = Vec::new();

        match reconciler.reconcile(&inventories, &corrections, &mut staged) {
            Err(ReconcileError::DuplicateOrderable { id, count }) => {
                assert_eq!(id, "o1");
                assert_eq!(count, 2);
            }
            other => panic!("Expected DuplicateOrderable, got {other:?}"),
        }
        assert!(staged.is_empty());
    }

    #[test]
    fn test_orderable_without_trade_item_is_skipped() {
        let bare: Orderable = serde_json::from_value(json!({"id": "o1"})).unwrap();
        let mut reconciler =
            Reconciler::new(vec![bare], vec![lot("lot1", "L1", "t-old")], LotReference::Id);
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": null}]))];
        let mut staged: Vec<Lot> = Vec::new();

        let corrected = reconciler
            .reconcile(&inventories, &corrections, &mut staged)
            .unwrap();

        assert_eq!(corrected, corrections);
        assert!(staged.is_empty());
    }

    struct FailingUpdater;

    impl LotUpdater for FailingUpdater {
        fn update_lot(&mut self, _lot: &Lot) -> Result<()> {
            Err(ReconcileError::MissingToken)
        }
    }

    #[test]
    fn test_updater_error_stops_the_pass() {
        let mut reconciler = Reconciler::new(
            vec![orderable("o1", "t-new")],
            vec![lot("lot1", "L1", "t-old")],
            LotReference::Id,
        );
        let corrections = vec![row("o1", "L1", "t-old")];
        let inventories = vec![inventory(json!([{"orderableId": "o1", "lotId": null}]))];

        let result = reconciler.reconcile(&inventories, &corrections, &mut FailingUpdater);
        assert!(result.is_err());
    }
}
