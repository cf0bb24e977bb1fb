//! Blood-stock records, filtering, aggregation and CSV export.
//!
//! Peripheral companion of the chat subsystem: the data behind the blood-stock
//! dashboard, with the fixed-header CSV export it offers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Records
// ============================================================================

/// Stock status of a batch of blood pouches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "disponible")]
    Disponible,
    #[serde(rename = "réservé")]
    Reserve,
    #[serde(rename = "proche péremption")]
    ProchePeremption,
    #[serde(rename = "expiré")]
    Expire,
}

impl StockStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::Disponible => "disponible",
            StockStatus::Reserve => "réservé",
            StockStatus::ProchePeremption => "proche péremption",
            StockStatus::Expire => "expiré",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One stock line: a blood group held at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub blood_type: String,
    pub quantity: u32,
    pub status: StockStatus,
    pub location: String,
    pub expiry_date: NaiveDate,
}

// ============================================================================
// Filtering
// ============================================================================

/// Dashboard filters. Every criterion is optional and they compose with AND;
/// the date range keeps records expiring strictly between its bounds.
#[derive(Debug, Clone, Default)]
pub struct StockFilter {
    pub blood_type: Option<String>,
    pub location: Option<String>,
    pub expiry_between: Option<(NaiveDate, NaiveDate)>,
}

impl StockFilter {
    pub fn apply(&self, records: &[StockRecord]) -> Vec<StockRecord> {
        records
            .iter()
            .filter(|record| {
                if let Some(blood_type) = &self.blood_type {
                    if &record.blood_type != blood_type {
                        return false;
                    }
                }
                if let Some(location) = &self.location {
                    if &record.location != location {
                        return false;
                    }
                }
                if let Some((start, end)) = &self.expiry_between {
                    if record.expiry_date <= *start || record.expiry_date >= *end {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Total pouches per blood group, in first-seen order.
pub fn quantity_by_blood_type(records: &[StockRecord]) -> Vec<(String, u32)> {
    sum_by(records, |record| record.blood_type.clone())
}

/// Total pouches per status label, in first-seen order.
pub fn quantity_by_status(records: &[StockRecord]) -> Vec<(String, u32)> {
    sum_by(records, |record| record.status.label().to_string())
}

fn sum_by(records: &[StockRecord], key: impl Fn(&StockRecord) -> String) -> Vec<(String, u32)> {
    let mut totals: Vec<(String, u32)> = Vec::new();
    for record in records {
        let name = key(record);
        match totals.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, quantity)) => *quantity += record.quantity,
            None => totals.push((name, record.quantity)),
        }
    }
    totals
}

// ============================================================================
// CSV export
// ============================================================================

const CSV_HEADER: &str = "Groupe Sanguin,Quantité,Statut,Localisation,Date péremption";

/// Comma-joined export of the filtered records, one row each, dates rendered
/// as `DD/MM/YYYY`.
pub fn export_csv(records: &[StockRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for record in records {
        lines.push(format!(
            "{},{},{},{},{}",
            record.blood_type,
            record.quantity,
            record.status,
            record.location,
            record.expiry_date.format("%d/%m/%Y")
        ));
    }
    lines.join("\n")
}

/// Download name of the export: `stock_sanguin_<YYYYMMDD>.csv`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("stock_sanguin_{}.csv", date.format("%Y%m%d"))
}

// ============================================================================
// Demo dataset
// ============================================================================

/// The mocked inventory the dashboard ships with.
pub fn mock_stock() -> Vec<StockRecord> {
    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    vec![
        StockRecord {
            blood_type: "A+".to_string(),
            quantity: 42,
            status: StockStatus::Disponible,
            location: "Banque centrale".to_string(),
            expiry_date: date(2023, 12, 15),
        },
        StockRecord {
            blood_type: "O-".to_string(),
            quantity: 35,
            status: StockStatus::Reserve,
            location: "Hôpital Principal".to_string(),
            expiry_date: date(2023, 11, 28),
        },
        StockRecord {
            blood_type: "B+".to_string(),
            quantity: 28,
            status: StockStatus::ProchePeremption,
            location: "Clinique Nord".to_string(),
            expiry_date: date(2023, 11, 5),
        },
        StockRecord {
            blood_type: "AB-".to_string(),
            quantity: 15,
            status: StockStatus::Expire,
            location: "Banque centrale".to_string(),
            expiry_date: date(2023, 10, 20),
        },
        StockRecord {
            blood_type: "A-".to_string(),
            quantity: 31,
            status: StockStatus::Disponible,
            location: "Hôpital Principal".to_string(),
            expiry_date: date(2023, 12, 20),
        },
        StockRecord {
            blood_type: "O+".to_string(),
            quantity: 50,
            status: StockStatus::Disponible,
            location: "Clinique Nord".to_string(),
            expiry_date: date(2023, 12, 10),
        },
    ]
}
