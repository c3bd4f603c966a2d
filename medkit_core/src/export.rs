//! CSV export of usage history and the shopping list.
//!
//! The CSV is built in memory, then written through a temp file that is
//! fsynced and renamed into place.

use crate::inventory::ShoppingList;
use crate::store::write_atomically;
use crate::{Result, UsageLog};
use std::path::Path;

/// A row in the usage-history CSV
#[derive(Debug, serde::Serialize)]
struct UsageRow<'a> {
    id: &'a str,
    timestamp: String,
    medicine_id: &'a str,
    medicine_name: &'a str,
    dose: u32,
    symptoms: String,
    was_effective: Option<bool>,
}

impl<'a> From<&'a UsageLog> for UsageRow<'a> {
    fn from(log: &'a UsageLog) -> Self {
        UsageRow {
            id: &log.id,
            timestamp: log.timestamp.to_rfc3339(),
            medicine_id: &log.medicine_id,
            medicine_name: &log.medicine_name,
            dose: log.dose,
            symptoms: log.symptoms.join("; "),
            was_effective: log.was_effective,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ShoppingRow<'a> {
    category: &'a str,
    name: &'a str,
    dosage: &'a str,
    quantity: u32,
    default_quantity: u32,
    status: &'static str,
}

const USAGE_HEADERS: [&str; 7] = [
    "id",
    "timestamp",
    "medicine_id",
    "medicine_name",
    "dose",
    "symptoms",
    "was_effective",
];

const SHOPPING_HEADERS: [&str; 6] = [
    "category",
    "name",
    "dosage",
    "quantity",
    "default_quantity",
    "status",
];

/// Write usage logs to `path`; returns the number of rows
pub fn export_usage_logs(logs: &[UsageLog], path: &Path) -> Result<usize> {
    let mut writer = writer_with_headers(&USAGE_HEADERS)?;
    for log in logs {
        writer.serialize(UsageRow::from(log))?;
    }
    finish(writer, path)?;

    tracing::info!("Exported {} usage logs to {:?}", logs.len(), path);
    Ok(logs.len())
}

/// Write the shopping list to `path`; returns the number of rows
pub fn export_shopping_list(list: &ShoppingList, path: &Path) -> Result<usize> {
    let mut writer = writer_with_headers(&SHOPPING_HEADERS)?;
    let mut rows = 0;
    for (category, medicines) in &list.groups {
        for medicine in medicines {
            writer.serialize(ShoppingRow {
                category,
                name: &medicine.name,
                dosage: &medicine.dosage,
                quantity: medicine.quantity,
                default_quantity: medicine.default_quantity,
                status: medicine.stock_status().label(),
            })?;
            rows += 1;
        }
    }
    finish(writer, path)?;

    tracing::info!("Exported {} shopping list rows to {:?}", rows, path);
    Ok(rows)
}

/// CSV writer with the header row already written
fn writer_with_headers(headers: &[&str]) -> Result<csv::Writer<Vec<u8>>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    Ok(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>, path: &Path) -> Result<()> {
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    write_atomically(path, &bytes)
}
