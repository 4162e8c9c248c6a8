use super::plan::PlanEvent;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One reflection per user per calendar day. Re-submitting on the same day
/// patches this record in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLogEntry {
    pub user_id: String,
    pub date: NaiveDate,
    pub reflection: String,
    pub energy: u8,
    pub mood: String,
    pub productivity_score: u8,
    pub impact_score: u8,
    pub did_today_count: bool,
    pub report: String,
    #[serde(default)]
    pub schedule: Vec<PlanEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyLogEntry {
    /// Replaces the mutable fields with a newer same-day submission, keeping
    /// the original creation time.
    pub fn patch_from(&mut self, newer: DailyLogEntry) {
        let created_at = self.created_at;
        *self = newer;
        self.created_at = created_at;
    }
}

/// Upserts `entry` into `history` by date and keeps newest-first order.
pub fn upsert_entry(history: &mut Vec<DailyLogEntry>, entry: DailyLogEntry) {
    match history.iter_mut().find(|e| e.date == entry.date) {
        Some(existing) => existing.patch_from(entry),
        None => history.push(entry),
    }
    history.sort_by(|a, b| b.date.cmp(&a.date));
}
