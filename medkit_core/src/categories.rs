//! Category repository. Categories are soft-deleted: the record stays on
//! disk with `isDeleted` set and disappears from every read.

use crate::store::{self, Collection, Document, IndexSpec, Store};
use crate::types::require_non_empty;
use crate::{Category, CategoryUpdate, DeletionPolicy, NewCategory, Result};
use chrono::Utc;

impl Document for Category {
    const COLLECTION: &'static str = "categories";
    const INDEXES: &'static [IndexSpec] =
        &[IndexSpec::unique("name"), IndexSpec::non_unique("isDeleted")];

    fn id(&self) -> &str {
        &self.id
    }

    fn index_value(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "isDeleted" => Some(self.is_deleted.to_string()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CategoryRepository {
    collection: Collection<Category>,
}

impl CategoryRepository {
    pub const DELETION_POLICY: DeletionPolicy = DeletionPolicy::SoftDelete;

    pub fn new(store: &Store) -> Self {
        Self {
            collection: store.collection(),
        }
    }

    /// Live categories, by name
    pub fn list(&self) -> Result<Vec<Category>> {
        let mut categories = self.collection.find_by("isDeleted", "false")?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    pub fn get(&self, id: &str) -> Result<Option<Category>> {
        let Some(id) = store::normalize_id(id) else {
            return Ok(None);
        };
        self.collection.find_one(|c| c.id == id && !c.is_deleted)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let name = name.trim();
        self.collection.find_one(|c| c.name == name && !c.is_deleted)
    }

    /// Fails with `DuplicateName` if the name is taken
    pub fn create(&self, input: NewCategory) -> Result<Category> {
        require_non_empty("name", &input.name)?;

        let now = Utc::now();
        let category = self.collection.insert(Category {
            id: store::new_id(),
            name: input.name.trim().to_string(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })?;

        tracing::info!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    pub fn update(&self, id: &str, changes: &CategoryUpdate) -> Result<Option<Category>> {
        if let Some(ref name) = changes.name {
            require_non_empty("name", name)?;
        }
        let Some(id) = store::normalize_id(id) else {
            return Ok(None);
        };
        self.collection.update_one(
            |c| c.id == id && !c.is_deleted,
            |c| {
                if let Some(ref name) = changes.name {
                    c.name = name.trim().to_string();
                }
                c.updated_at = Utc::now();
            },
        )
    }

    /// Mark a category deleted. Medicines keep their `categoryName`.
    pub fn soft_delete(&self, id: &str) -> Result<bool> {
        let Some(id) = store::normalize_id(id) else {
            return Ok(false);
        };
        let deleted = self.collection.update_one(
            |c| c.id == id && !c.is_deleted,
            |c| {
                c.is_deleted = true;
                c.updated_at = Utc::now();
            },
        )?;
        if deleted.is_some() {
            tracing::info!("Soft-deleted category {}", id);
        }
        Ok(deleted.is_some())
    }
}
