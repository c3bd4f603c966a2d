//! Dose and restock orchestration.
//!
//! Composite operations that span the medicine and usage-log repositories:
//! - take a dose (decrement stock and log the event)
//! - restock one medicine or every low-stock medicine
//! - the shopping list and dashboard read models

use crate::{
    CategoryRepository, DoseTaken, Medicine, MedicineRepository, NewUsageLog, Result, Store,
    UsageLog, UsageLogRepository,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of usage logs shown on the dashboard
pub const DASHBOARD_RECENT_LOGS: usize = 5;

/// Low-stock medicines grouped for shopping
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    /// Category name -> medicines, each group ordered emptiest first
    pub groups: BTreeMap<String, Vec<Medicine>>,
    pub out_of_stock: usize,
    pub running_low: usize,
}

impl ShoppingList {
    pub fn from_low_stock(medicines: Vec<Medicine>) -> Self {
        let out_of_stock = medicines.iter().filter(|m| m.quantity == 0).count();
        let running_low = medicines.len() - out_of_stock;

        let mut groups: BTreeMap<String, Vec<Medicine>> = BTreeMap::new();
        for medicine in medicines {
            groups
                .entry(medicine.category_name.clone())
                .or_default()
                .push(medicine);
        }

        Self {
            groups,
            out_of_stock,
            running_low,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.out_of_stock + self.running_low == 0
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub quick_access: Vec<Medicine>,
    pub low_stock: Vec<Medicine>,
    pub recent_logs: Vec<UsageLog>,
}

/// Entry point bundling the three repositories over one store
#[derive(Clone, Debug)]
pub struct Inventory {
    pub medicines: MedicineRepository,
    pub categories: CategoryRepository,
    pub usage: UsageLogRepository,
}

impl Inventory {
    pub fn new(store: &Store) -> Self {
        Self {
            medicines: MedicineRepository::new(store),
            categories: CategoryRepository::new(store),
            usage: UsageLogRepository::new(store),
        }
    }

    /// Take one dose of a medicine.
    ///
    /// Returns `None` without touching anything when the medicine does not
    /// exist or has no stock left. With no `symptoms` supplied, the
    /// medicine's first recorded symptom is logged.
    pub fn take_dose(&self, medicine_id: &str, symptoms: &[String]) -> Result<Option<DoseTaken>> {
        let Some(current) = self.medicines.get(medicine_id)? else {
            tracing::info!("Dose refused: medicine {} not found", medicine_id);
            return Ok(None);
        };
        let symptoms = resolve_symptoms(symptoms, &current);

        let now = Utc::now();
        let updated = self.medicines.update_where(
            &current.id,
            |m| m.quantity > 0,
            |m| {
                m.quantity -= 1;
                m.usage_count = m.usage_count.saturating_add(1);
                m.last_used = Some(now);
                m.is_quick_access = true;
                m.updated_at = now;
            },
        )?;

        let Some(medicine) = updated else {
            tracing::info!("Dose refused: {} is out of stock", current.name);
            return Ok(None);
        };

        let log = self.usage.append(NewUsageLog {
            medicine_id: medicine.id.clone(),
            medicine_name: medicine.name.clone(),
            dose: 1,
            symptoms,
            was_effective: None,
        })?;

        tracing::info!(
            "Took a dose of {} ({} left)",
            medicine.name,
            medicine.quantity
        );
        Ok(Some(DoseTaken { medicine, log }))
    }

    /// Reset a medicine's quantity to its default
    pub fn restock(&self, medicine_id: &str) -> Result<Option<Medicine>> {
        let restocked = self.medicines.update_where(
            medicine_id,
            |_| true,
            |m| {
                m.quantity = m.restock_quantity();
                m.updated_at = Utc::now();
            },
        )?;
        if let Some(ref m) = restocked {
            tracing::info!("Restocked {} to {}", m.name, m.quantity);
        }
        Ok(restocked)
    }

    /// Restock every medicine that is low at call time.
    ///
    /// Each reset is its own atomic update; an error partway through leaves
    /// earlier resets applied.
    pub fn restock_all(&self) -> Result<usize> {
        let low = self.medicines.low_stock()?;
        let mut restocked = 0;
        for medicine in &low {
            if self.restock(&medicine.id)?.is_some() {
                restocked += 1;
            }
        }
        tracing::info!("Restocked {} of {} low-stock medicines", restocked, low.len());
        Ok(restocked)
    }

    pub fn shopping_list(&self) -> Result<ShoppingList> {
        Ok(ShoppingList::from_low_stock(self.medicines.low_stock()?))
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        let mut recent_logs = self.usage.list_all()?;
        recent_logs.truncate(DASHBOARD_RECENT_LOGS);
        Ok(Dashboard {
            quick_access: self.medicines.quick_access()?,
            low_stock: self.medicines.low_stock()?,
            recent_logs,
        })
    }
}

/// Symptoms to log for a dose: the caller's, else the medicine's first
/// recorded symptom, else none.
pub fn resolve_symptoms(requested: &[String], medicine: &Medicine) -> Vec<String> {
    let requested = crate::normalize_symptoms(requested.to_vec());
    if !requested.is_empty() {
        return requested;
    }
    medicine.symptoms.iter().take(1).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MedicineUpdate, NewMedicine};

    fn setup() -> (tempfile::TempDir, Inventory) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).unwrap();
        (temp_dir, Inventory::new(&store))
    }

    fn add(inv: &Inventory, name: &str, quantity: u32, default_quantity: u32) -> Medicine {
        inv.medicines
            .create(NewMedicine {
                name: name.into(),
                category_id: "cat-1".into(),
                category_name: "Pain Relief".into(),
                purpose: None,
                usage_notes: None,
                dosage: "1 tablet".into(),
                quantity,
                default_quantity,
                symptoms: vec!["Headache".into(), "Fever".into()],
            })
            .unwrap()
    }

    #[test]
    fn test_take_dose_updates_medicine_and_logs() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 5, 10);

        let taken = inv
            .take_dose(&m.id, &["Fever".to_string()])
            .unwrap()
            .unwrap();

        assert_eq!(taken.medicine.quantity, 4);
        assert_eq!(taken.medicine.usage_count, 1);
        assert!(taken.medicine.is_quick_access);
        assert!(taken.medicine.last_used.is_some());
        assert_eq!(taken.log.dose, 1);
        assert_eq!(taken.log.symptoms, vec!["Fever"]);
        assert_eq!(taken.log.medicine_name, "Aspirin");
        assert_eq!(taken.log.was_effective, None);

        let logs = inv.usage.list_for_medicine(&m.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(inv.medicines.get(&m.id).unwrap().unwrap(), taken.medicine);
    }

    #[test]
    fn test_take_dose_with_no_stock_changes_nothing() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 0, 10);

        assert!(inv.take_dose(&m.id, &[]).unwrap().is_none());
        assert_eq!(inv.medicines.get(&m.id).unwrap().unwrap(), m);
        assert!(inv.usage.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_take_dose_unknown_medicine() {
        let (_dir, inv) = setup();
        assert!(inv.take_dose("not-an-id", &[]).unwrap().is_none());
        assert!(inv.take_dose(&crate::store::new_id(), &[]).unwrap().is_none());
        assert!(inv.usage.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_take_dose_defaults_to_first_symptom() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 2, 10);

        let taken = inv.take_dose(&m.id, &[]).unwrap().unwrap();
        assert_eq!(taken.log.symptoms, vec!["Headache"]);

        inv.medicines
            .update(
                &m.id,
                &MedicineUpdate {
                    symptoms: Some(vec![]),
                    ..Default::default()
                },
            )
            .unwrap();
        let taken = inv.take_dose(&m.id, &[]).unwrap().unwrap();
        assert!(taken.log.symptoms.is_empty());
    }

    #[test]
    fn test_usage_count_saturates() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 2, 10);
        inv.medicines
            .update_where(&m.id, |_| true, |d| d.usage_count = u32::MAX)
            .unwrap()
            .unwrap();

        let taken = inv.take_dose(&m.id, &[]).unwrap().unwrap();
        assert_eq!(taken.medicine.usage_count, u32::MAX);
        assert_eq!(taken.medicine.quantity, 1);
    }

    #[test]
    fn test_last_dose_empties_stock_then_refuses() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 1, 10);

        let taken = inv.take_dose(&m.id, &[]).unwrap().unwrap();
        assert_eq!(taken.medicine.quantity, 0);
        assert!(inv.take_dose(&m.id, &[]).unwrap().is_none());
        assert_eq!(inv.usage.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_restock_resets_to_default_even_when_stocked() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 25, 12);

        let restocked = inv.restock(&m.id).unwrap().unwrap();
        assert_eq!(restocked.quantity, 12);
        assert!(inv.restock("missing").unwrap().is_none());
    }

    #[test]
    fn test_restock_all_only_touches_low_stock() {
        let (_dir, inv) = setup();
        let empty = add(&inv, "Empty", 0, 6);
        let low = add(&inv, "Low", 3, 8);
        let fine = add(&inv, "Fine", 4, 20);

        assert_eq!(inv.restock_all().unwrap(), 2);

        assert_eq!(inv.medicines.get(&empty.id).unwrap().unwrap().quantity, 6);
        assert_eq!(inv.medicines.get(&low.id).unwrap().unwrap().quantity, 8);
        assert_eq!(inv.medicines.get(&fine.id).unwrap().unwrap(), fine);
        assert_eq!(inv.restock_all().unwrap(), 0);
    }

    #[test]
    fn test_usage_logs_survive_medicine_deletion() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 3, 10);
        inv.take_dose(&m.id, &[]).unwrap().unwrap();

        assert!(inv.medicines.hard_delete(&m.id).unwrap());
        let logs = inv.usage.list_for_medicine(&m.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].medicine_name, "Aspirin");
    }

    #[test]
    fn test_shopping_list_groups_and_counts() {
        let (_dir, inv) = setup();
        add(&inv, "Aspirin", 0, 10);
        add(&inv, "Ibuprofen", 2, 10);
        add(&inv, "Paracetamol", 9, 10);
        inv.medicines
            .create(NewMedicine {
                name: "Cetirizine".into(),
                category_id: "cat-2".into(),
                category_name: "Allergy".into(),
                purpose: None,
                usage_notes: None,
                dosage: "10mg".into(),
                quantity: 1,
                default_quantity: 10,
                symptoms: vec![],
            })
            .unwrap();

        let list = inv.shopping_list().unwrap();
        assert_eq!(list.out_of_stock, 1);
        assert_eq!(list.running_low, 2);
        assert_eq!(list.groups["Pain Relief"].len(), 2);
        assert_eq!(list.groups["Pain Relief"][0].name, "Aspirin");
        assert_eq!(list.groups["Allergy"].len(), 1);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_dashboard_sections() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 4, 10);
        add(&inv, "Ibuprofen", 9, 10);
        for _ in 0..2 {
            inv.take_dose(&m.id, &[]).unwrap().unwrap();
        }

        let dashboard = inv.dashboard().unwrap();
        assert_eq!(dashboard.quick_access.len(), 1);
        assert_eq!(dashboard.quick_access[0].id, m.id);
        assert_eq!(dashboard.low_stock.len(), 1);
        assert_eq!(dashboard.recent_logs.len(), 2);
    }

    #[test]
    fn test_resolve_symptoms() {
        let (_dir, inv) = setup();
        let m = add(&inv, "Aspirin", 4, 10);
        assert_eq!(
            resolve_symptoms(&["Nausea".to_string()], &m),
            vec!["Nausea"]
        );
        assert_eq!(resolve_symptoms(&[" ".to_string()], &m), vec!["Headache"]);
    }
}
