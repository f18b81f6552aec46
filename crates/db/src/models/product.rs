//! Core product row.

use muninn_core::datetime::naive_utc;
use muninn_core::removal::ProductFile;
use muninn_core::types::{ProductId, Timestamp};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from an archive's core table.
///
/// Column names and order follow `muninn_core::schema::CORE_FIELDS`;
/// `footprint` is always read back as GeoJSON.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub uuid: ProductId,
    pub active: bool,
    pub hash: Option<String>,
    pub size: Option<i64>,
    #[serde(with = "naive_utc")]
    pub metadata_date: Timestamp,
    #[serde(with = "naive_utc::option")]
    pub archive_date: Option<Timestamp>,
    pub archive_path: Option<String>,
    pub product_type: String,
    pub product_name: String,
    pub physical_name: String,
    #[serde(with = "naive_utc::option")]
    pub validity_start: Option<Timestamp>,
    #[serde(with = "naive_utc::option")]
    pub validity_stop: Option<Timestamp>,
    #[serde(with = "naive_utc::option")]
    pub creation_date: Option<Timestamp>,
    pub remote_url: Option<String>,
    pub footprint: Option<Json<Value>>,
}

impl Product {
    /// The row as a JSON object keyed by column name.
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Location of the product's file in the archive.
    pub fn file(&self) -> ProductFile {
        ProductFile {
            uuid: self.uuid,
            product_name: self.product_name.clone(),
            archive_path: self.archive_path.clone(),
            physical_name: self.physical_name.clone(),
        }
    }
}
