//! Reference records and the correction table.
//!
//! JSON records mirror the inventory API field names (camelCase); the
//! correction table mirrors the column names of the database export.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A catalog product entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Orderable {
    /// Internal orderable id (UUID).
    pub id: String,

    #[serde(default)]
    pub product_code: Option<String>,

    #[serde(default)]
    pub identifiers: Option<Identifiers>,
}

impl Orderable {
    /// Returns the authoritative trade-item id, if the orderable carries one.
    pub fn trade_item(&self) -> Option<&str> {
        self.identifiers
            .as_ref()
            .and_then(|ids| ids.trade_item.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// External identifiers attached to an orderable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifiers {
    #[serde(default)]
    pub trade_item: Option<String>,
}

/// A batch of an orderable.
///
/// Fields we don't touch are carried in `extra` so that writing the lot back
/// sends the complete record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: String,

    pub lot_code: String,

    /// Trade item this lot belongs to. May be stale after the upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_item_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A recorded stock count.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalInventory {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// One entry of a physical inventory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub orderable_id: String,

    #[serde(default)]
    pub lot_id: Option<String>,

    #[serde(default)]
    pub lot_code: Option<String>,
}

/// Which line-item field identifies its lot.
///
/// The live API links line items to lots by `lotId`; the local dumps carry
/// the denormalised `lotCode` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotReference {
    Id,
    Code,
}

impl LineItem {
    /// Returns `true` if the line item has no lot under the given reference.
    pub fn is_unresolved(&self, reference: LotReference) -> bool {
        match reference {
            LotReference::Id => self.lot_id.is_none(),
            LotReference::Code => self.lot_code.is_none(),
        }
    }
}

/// One row of the externally supplied orderable / lot / trade-item mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CorrectionRow {
    #[serde(rename = "orderableid")]
    pub orderable_id: String,

    #[serde(rename = "productCode", default)]
    pub product_code: String,

    #[serde(rename = "lotcode")]
    pub lot_code: String,

    #[serde(rename = "tradeitemid")]
    pub trade_item_id: String,
}

impl CorrectionRow {
    /// Column names, in output order.
    pub const HEADERS: [&'static str; 4] = ["orderableid", "productCode", "lotcode", "tradeitemid"];
}

/// A collection as returned by the API: either a bare array or a page
/// object wrapping the items in `content`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Collection<T> {
    Items(Vec<T>),
    Page { content: Vec<T> },
}

/// Decodes a JSON collection in either of the shapes the API returns.
pub fn parse_collection<T: DeserializeOwned>(value: Value) -> Result<Vec<T>> {
    let collection: Collection<T> = serde_json::from_value(value)?;
    Ok(match collection {
        Collection::Items(items) => items,
        Collection::Page { content } => content,
    })
}
