//! Append-only usage log of dose events.
//!
//! Logs are never edited or removed. Reads are capped and newest-first.

use crate::store::{self, Collection, Document, IndexSpec, Store};
use crate::{NewUsageLog, Result, UsageLog};
use chrono::{NaiveDate, Utc};

/// Maximum number of logs returned by [`UsageLogRepository::list_all`]
pub const RECENT_LOG_LIMIT: usize = 100;

/// Maximum number of logs returned per medicine
pub const MEDICINE_LOG_LIMIT: usize = 50;

impl Document for UsageLog {
    const COLLECTION: &'static str = "usage_logs";
    const INDEXES: &'static [IndexSpec] = &[IndexSpec::non_unique("medicineId")];

    fn id(&self) -> &str {
        &self.id
    }

    fn index_value(&self, field: &str) -> Option<String> {
        match field {
            "medicineId" => Some(self.medicine_id.clone()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UsageLogRepository {
    collection: Collection<UsageLog>,
}

impl UsageLogRepository {
    pub fn new(store: &Store) -> Self {
        Self {
            collection: store.collection(),
        }
    }

    /// Most recent logs across all medicines
    pub fn list_all(&self) -> Result<Vec<UsageLog>> {
        self.collection.find_sorted(
            |_| true,
            |a, b| b.timestamp.cmp(&a.timestamp),
            Some(RECENT_LOG_LIMIT),
        )
    }

    /// Most recent logs for one medicine. Works for deleted medicines too.
    pub fn list_for_medicine(&self, medicine_id: &str) -> Result<Vec<UsageLog>> {
        let medicine_id = store::normalize_id(medicine_id).unwrap_or_else(|| medicine_id.to_string());
        let mut logs = self.collection.find_by("medicineId", &medicine_id)?;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(MEDICINE_LOG_LIMIT);
        Ok(logs)
    }

    /// Persist a new log stamped with the current time
    pub fn append(&self, input: NewUsageLog) -> Result<UsageLog> {
        let log = self.collection.insert(UsageLog {
            id: store::new_id(),
            medicine_id: input.medicine_id,
            medicine_name: input.medicine_name,
            dose: input.dose,
            symptoms: input.symptoms,
            timestamp: Utc::now(),
            was_effective: input.was_effective,
        })?;
        tracing::debug!("Logged dose of {} ({})", log.medicine_name, log.medicine_id);
        Ok(log)
    }
}

/// Group logs by UTC calendar day, newest day first
pub fn group_by_day(logs: &[UsageLog]) -> Vec<(NaiveDate, Vec<UsageLog>)> {
    let mut sorted = logs.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut groups: Vec<(NaiveDate, Vec<UsageLog>)> = Vec::new();
    for log in sorted {
        let day = log.timestamp.date_naive();
        if let Some((d, entries)) = groups.last_mut() {
            if *d == day {
                entries.push(log);
                continue;
            }
        }
        groups.push((day, vec![log]));
    }
    groups
}
