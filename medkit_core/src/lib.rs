#![forbid(unsafe_code)]

//! Core domain model and business logic for MedKit, a personal
//! medicine-inventory tracker.
//!
//! This crate provides:
//! - Domain types (medicines, categories, usage logs, stock status)
//! - A file-backed document store
//! - Medicine, category and usage-log repositories
//! - Dose and restock orchestration
//! - Session store and auth gate
//! - CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod store;
pub mod medicines;
pub mod categories;
pub mod usage_log;
pub mod inventory;
pub mod session;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::Store;
pub use medicines::MedicineRepository;
pub use categories::CategoryRepository;
pub use usage_log::UsageLogRepository;
pub use inventory::{Dashboard, Inventory, ShoppingList};
pub use session::{Authenticator, InMemorySessionStore, Session, SessionStore};
