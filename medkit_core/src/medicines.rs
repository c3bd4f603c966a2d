//! Medicine repository: CRUD plus the inventory queries.

use crate::store::{self, Collection, Document, IndexSpec, Store};
use crate::{
    normalize_symptoms, DeletionPolicy, Medicine, MedicineUpdate, NewMedicine, Result,
    LOW_STOCK_THRESHOLD,
};
use chrono::{DateTime, Duration, Utc};
use std::cmp::{Ordering, Reverse};

/// Window in which a dose puts a medicine on the quick-access list
pub const QUICK_ACCESS_WINDOW_DAYS: i64 = 7;

/// Usage count that keeps a medicine on the quick-access list
pub const QUICK_ACCESS_MIN_USES: u32 = 5;

/// Maximum number of quick-access medicines returned
pub const QUICK_ACCESS_LIMIT: usize = 8;

impl Document for Medicine {
    const COLLECTION: &'static str = "medicines";
    const INDEXES: &'static [IndexSpec] = &[
        IndexSpec::non_unique("categoryId"),
        IndexSpec::non_unique("categoryName"),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn index_value(&self, field: &str) -> Option<String> {
        match field {
            "categoryId" => Some(self.category_id.clone()),
            "categoryName" => Some(self.category_name.clone()),
            _ => None,
        }
    }
}

/// Repository over the medicines collection
#[derive(Clone, Debug)]
pub struct MedicineRepository {
    collection: Collection<Medicine>,
}

impl MedicineRepository {
    pub const DELETION_POLICY: DeletionPolicy = DeletionPolicy::HardDelete;

    pub fn new(store: &Store) -> Self {
        Self {
            collection: store.collection(),
        }
    }

    /// All medicines, by name
    pub fn list(&self) -> Result<Vec<Medicine>> {
        self.collection
            .find_sorted(|_| true, |a, b| a.name.cmp(&b.name), None)
    }

    /// Medicines in one category, by name
    pub fn list_by_category(&self, category_id: &str) -> Result<Vec<Medicine>> {
        let mut medicines = self.collection.find_by("categoryId", category_id)?;
        medicines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(medicines)
    }

    /// One medicine. A malformed id is reported as not found.
    pub fn get(&self, id: &str) -> Result<Option<Medicine>> {
        let Some(id) = store::normalize_id(id) else {
            return Ok(None);
        };
        self.collection.find_one(|m| m.id == id)
    }

    /// Medicines treating any of `symptoms`, best candidates first
    pub fn search(&self, symptoms: &[String]) -> Result<Vec<Medicine>> {
        let symptoms = normalize_symptoms(symptoms.to_vec());
        if symptoms.is_empty() {
            return Ok(Vec::new());
        }
        let mut medicines = self
            .collection
            .find(|m| m.symptoms.iter().any(|s| symptoms.contains(s)))?;
        rank_by_symptoms(&mut medicines, &symptoms);
        Ok(medicines)
    }

    /// Recently or frequently used medicines
    pub fn quick_access(&self) -> Result<Vec<Medicine>> {
        self.quick_access_at(Utc::now())
    }

    pub fn quick_access_at(&self, now: DateTime<Utc>) -> Result<Vec<Medicine>> {
        let cutoff = now - Duration::days(QUICK_ACCESS_WINDOW_DAYS);
        self.collection.find_sorted(
            |m| is_quick_access_candidate(m, cutoff),
            quick_access_order,
            Some(QUICK_ACCESS_LIMIT),
        )
    }

    /// Medicines at or below the low-stock threshold, emptiest first
    pub fn low_stock(&self) -> Result<Vec<Medicine>> {
        self.collection.find_sorted(
            |m| m.quantity <= LOW_STOCK_THRESHOLD,
            |a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)),
            None,
        )
    }

    pub fn create(&self, input: NewMedicine) -> Result<Medicine> {
        input.validate()?;

        let now = Utc::now();
        let medicine = Medicine {
            id: store::new_id(),
            name: input.name,
            category_id: input.category_id,
            category_name: input.category_name,
            purpose: input.purpose,
            usage_notes: input.usage_notes,
            dosage: input.dosage,
            quantity: input.quantity,
            default_quantity: input.default_quantity,
            symptoms: normalize_symptoms(input.symptoms),
            usage_count: 0,
            last_used: None,
            is_quick_access: false,
            created_at: now,
            updated_at: now,
        };

        let medicine = self.collection.insert(medicine)?;
        tracing::info!("Created medicine {} ({})", medicine.name, medicine.id);
        Ok(medicine)
    }

    /// Merge `changes` into a medicine and refresh `updatedAt`
    pub fn update(&self, id: &str, changes: &MedicineUpdate) -> Result<Option<Medicine>> {
        changes.validate()?;
        let Some(id) = store::normalize_id(id) else {
            return Ok(None);
        };
        self.collection.update_one(
            |m| m.id == id,
            |m| {
                changes.apply(m);
                m.updated_at = Utc::now();
            },
        )
    }

    /// Atomically apply `mutate` to a medicine that passes `guard`
    pub(crate) fn update_where<G, M>(&self, id: &str, guard: G, mutate: M) -> Result<Option<Medicine>>
    where
        G: Fn(&Medicine) -> bool,
        M: FnOnce(&mut Medicine),
    {
        let Some(id) = store::normalize_id(id) else {
            return Ok(None);
        };
        self.collection
            .update_one(|m| m.id == id && guard(m), mutate)
    }

    /// Remove a medicine for good. Its usage logs are left in place.
    pub fn hard_delete(&self, id: &str) -> Result<bool> {
        let Some(id) = store::normalize_id(id) else {
            return Ok(false);
        };
        let removed = self.collection.delete_one(|m| m.id == id)?;
        if removed {
            tracing::info!("Deleted medicine {}", id);
        }
        Ok(removed)
    }
}

fn is_quick_access_candidate(medicine: &Medicine, cutoff: DateTime<Utc>) -> bool {
    medicine.last_used.map_or(false, |t| t >= cutoff)
        || medicine.usage_count >= QUICK_ACCESS_MIN_USES
        || medicine.is_quick_access
}

// Never-used medicines sort after every dated one.
fn quick_access_order(a: &Medicine, b: &Medicine) -> Ordering {
    b.last_used
        .cmp(&a.last_used)
        .then_with(|| b.usage_count.cmp(&a.usage_count))
}

/// In stock first, then most matching symptoms, then most used.
pub fn rank_by_symptoms(medicines: &mut [Medicine], symptoms: &[String]) {
    medicines.sort_by_key(|m| {
        (
            m.quantity == 0,
            Reverse(m.matching_symptoms(symptoms)),
            Reverse(m.usage_count),
        )
    });
}
