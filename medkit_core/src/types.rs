//! Core domain types for MedKit.
//!
//! This module defines the public entity shapes:
//! - Medicines and their stock classification
//! - Categories
//! - Usage logs (dose events)
//!
//! All records serialize with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Inventory constants
// ============================================================================

/// Quantity at or below which a medicine counts as low stock
pub const LOW_STOCK_THRESHOLD: u32 = 3;

/// Restock target for medicines that carry no default quantity
pub const DEFAULT_RESTOCK_QUANTITY: u32 = 10;

/// Symptom pick-list offered when recording medicines and doses
pub const KNOWN_SYMPTOMS: [&str; 9] = [
    "Fever",
    "Headache",
    "Nausea",
    "Cold & Flu",
    "Body Pain",
    "Allergy",
    "Stomach",
    "Sleep Aid",
    "Anxiety",
];

// ============================================================================
// Stock status
// ============================================================================

/// Derived stock classification. Recomputed on every read, never stored.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    Out,
    Low,
    InStock,
}

impl StockStatus {
    pub fn from_quantity(quantity: u32) -> Self {
        match quantity {
            0 => StockStatus::Out,
            q if q <= LOW_STOCK_THRESHOLD => StockStatus::Low,
            _ => StockStatus::InStock,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::Out => "out",
            StockStatus::Low => "low",
            StockStatus::InStock => "in-stock",
        }
    }
}

/// How a repository removes records
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionPolicy {
    /// Flag the record inactive; it stays on disk
    SoftDelete,
    /// Physically remove the record
    HardDelete,
}

impl DeletionPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            DeletionPolicy::SoftDelete => "archived",
            DeletionPolicy::HardDelete => "permanent",
        }
    }
}

// ============================================================================
// Medicine
// ============================================================================

fn default_restock_quantity() -> u32 {
    DEFAULT_RESTOCK_QUANTITY
}

/// A medicine in the inventory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub category_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_notes: Option<String>,
    pub dosage: String,
    pub quantity: u32,
    #[serde(default = "default_restock_quantity")]
    pub default_quantity: u32,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_quick_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::from_quantity(self.quantity)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= LOW_STOCK_THRESHOLD
    }

    /// Quantity a restock resets to
    pub fn restock_quantity(&self) -> u32 {
        if self.default_quantity == 0 {
            DEFAULT_RESTOCK_QUANTITY
        } else {
            self.default_quantity
        }
    }

    /// Number of `symptoms` that appear in this medicine's symptom set
    pub fn matching_symptoms(&self, symptoms: &[String]) -> usize {
        self.symptoms
            .iter()
            .filter(|s| symptoms.contains(s))
            .count()
    }
}

/// Caller-supplied fields for a new medicine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedicine {
    pub name: String,
    pub category_id: String,
    pub category_name: String,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub usage_notes: Option<String>,
    pub dosage: String,
    pub quantity: u32,
    #[serde(default = "default_restock_quantity")]
    pub default_quantity: u32,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

impl NewMedicine {
    pub fn validate(&self) -> crate::Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("categoryId", &self.category_id)?;
        require_non_empty("categoryName", &self.category_name)?;
        require_default_quantity(self.default_quantity)
    }
}

/// Partial edit of a medicine. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineUpdate {
    pub name: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub purpose: Option<String>,
    pub usage_notes: Option<String>,
    pub dosage: Option<String>,
    pub quantity: Option<u32>,
    pub default_quantity: Option<u32>,
    pub symptoms: Option<Vec<String>>,
}

impl MedicineUpdate {
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(ref name) = self.name {
            require_non_empty("name", name)?;
        }
        if let Some(ref id) = self.category_id {
            require_non_empty("categoryId", id)?;
        }
        if let Some(ref name) = self.category_name {
            require_non_empty("categoryName", name)?;
        }
        if let Some(default_quantity) = self.default_quantity {
            require_default_quantity(default_quantity)?;
        }
        Ok(())
    }

    /// Merge the provided fields into `medicine`
    pub fn apply(&self, medicine: &mut Medicine) {
        if let Some(ref v) = self.name {
            medicine.name = v.clone();
        }
        if let Some(ref v) = self.category_id {
            medicine.category_id = v.clone();
        }
        if let Some(ref v) = self.category_name {
            medicine.category_name = v.clone();
        }
        if let Some(ref v) = self.purpose {
            medicine.purpose = Some(v.clone());
        }
        if let Some(ref v) = self.usage_notes {
            medicine.usage_notes = Some(v.clone());
        }
        if let Some(ref v) = self.dosage {
            medicine.dosage = v.clone();
        }
        if let Some(v) = self.quantity {
            medicine.quantity = v;
        }
        if let Some(v) = self.default_quantity {
            medicine.default_quantity = v;
        }
        if let Some(ref v) = self.symptoms {
            medicine.symptoms = normalize_symptoms(v.clone());
        }
    }
}

// ============================================================================
// Category
// ============================================================================

/// A medicine category
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
}

// ============================================================================
// Usage log
// ============================================================================

/// A recorded dose event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageLog {
    pub id: String,
    pub medicine_id: String,
    /// Medicine name at the time the dose was taken
    pub medicine_name: String,
    #[serde(default = "default_dose")]
    pub dose: u32,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub was_effective: Option<bool>,
}

fn default_dose() -> u32 {
    1
}

/// Fields for a new usage log; id and timestamp are assigned on append
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUsageLog {
    pub medicine_id: String,
    pub medicine_name: String,
    pub dose: u32,
    pub symptoms: Vec<String>,
    pub was_effective: Option<bool>,
}

/// Result of a successful dose
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseTaken {
    pub medicine: Medicine,
    pub log: UsageLog,
}

// ============================================================================
// Helpers
// ============================================================================

/// Trim symptoms, drop blanks and duplicates, keep first-seen order
pub fn normalize_symptoms(symptoms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symptoms.len());
    for symptom in symptoms {
        let symptom = symptom.trim();
        if !symptom.is_empty() && !out.iter().any(|s| s == symptom) {
            out.push(symptom.to_string());
        }
    }
    out
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_default_quantity(value: u32) -> crate::Result<()> {
    if value < 1 {
        return Err(crate::Error::Validation(
            "defaultQuantity must be at least 1".into(),
        ));
    }
    Ok(())
}
