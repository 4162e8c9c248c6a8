use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// First and last hourly slot of a generated day (06:00 through 19:00).
pub const FIRST_HOUR: u32 = 6;
pub const LAST_HOUR: u32 = 19;
pub const MAX_EVENTS_PER_DAY: usize = 14;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanEvent {
    pub id: String,
    pub title: String,
    /// `HH:MM`, hour granularity.
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub completed: bool,
}

fn default_event_type() -> String {
    "deep-work".to_string()
}

impl PlanEvent {
    pub fn new(title: &str, start: &str, event_type: &str) -> Option<Self> {
        let hour = parse_hour(start)?;
        Some(Self {
            id: format!("op_{:02}_{}", hour, uuid::Uuid::new_v4().simple()),
            title: title.trim().to_string(),
            start: format_hour(hour),
            end: format_hour((hour + 1).min(23)),
            event_type: if event_type.trim().is_empty() {
                default_event_type()
            } else {
                event_type.trim().to_lowercase()
            },
            completed: false,
        })
    }

    pub fn hour(&self) -> Option<u32> {
        parse_hour(&self.start)
    }

    pub fn is_deep_work(&self) -> bool {
        self.event_type == "deep-work"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPlan {
    pub user_id: String,
    pub date: NaiveDate,
    pub events: Vec<PlanEvent>,
}

impl DailyPlan {
    pub fn new(user_id: &str, date: NaiveDate, mut events: Vec<PlanEvent>) -> Self {
        sort_events(&mut events);
        Self {
            user_id: user_id.to_string(),
            date,
            events,
        }
    }

    pub fn completion_percentage(&self) -> f32 {
        if self.events.is_empty() {
            return 0.0;
        }
        let done = self.events.iter().filter(|e| e.completed).count();
        done as f32 / self.events.len() as f32 * 100.0
    }

    pub fn event_at_hour(&self, hour: u32) -> Option<&PlanEvent> {
        self.events.iter().find(|e| e.hour() == Some(hour))
    }
}

/// Day-scoped commitment flag. A lock recorded for another date reads as
/// unlocked.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanLock {
    pub locked: bool,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    Unlocked,
    Locked,
}

impl PlanLock {
    pub fn state_on(&self, today: NaiveDate) -> LockState {
        if self.locked && self.date == Some(today) {
            LockState::Locked
        } else {
            LockState::Unlocked
        }
    }

    pub fn locked_on(today: NaiveDate) -> Self {
        Self {
            locked: true,
            date: Some(today),
        }
    }
}

/// Accepts `H`, `HH`, `H:MM` or `HH:MM`; minutes are dropped.
pub fn parse_hour(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(t) = NaiveTime::parse_from_str(value, "%H:%M") {
        return Some(t.hour());
    }
    value.parse::<u32>().ok().filter(|h| *h < 24)
}

pub fn format_hour(hour: u32) -> String {
    format!("{:02}:00", hour)
}

pub fn sort_events(events: &mut [PlanEvent]) {
    events.sort_by_key(|e| e.hour().unwrap_or(u32::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hour_variants() {
        assert_eq!(parse_hour("06:00"), Some(6));
        assert_eq!(parse_hour("7:30"), Some(7));
        assert_eq!(parse_hour("19"), Some(19));
        assert_eq!(parse_hour("25:00"), None);
        assert_eq!(parse_hour("noon"), None);
    }

    #[test]
    fn test_new_event_normalizes() {
        let event = PlanEvent::new(" Deep Focus ", "9:15", "Deep-Work").unwrap();
        assert_eq!(event.start, "09:00");
        assert_eq!(event.end, "10:00");
        assert_eq!(event.event_type, "deep-work");
        assert_eq!(event.title, "Deep Focus");
        assert!(event.id.starts_with("op_09_"));
    }

    #[test]
    fn test_plan_sorted_and_completion() {
        let mut late = PlanEvent::new("Gym", "17:00", "rest").unwrap();
        late.completed = true;
        let early = PlanEvent::new("Write", "08:00", "").unwrap();
        let plan = DailyPlan::new("u1", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), vec![late, early]);

        assert_eq!(plan.events[0].start, "08:00");
        assert_eq!(plan.completion_percentage(), 50.0);
        assert_eq!(plan.event_at_hour(17).map(|e| e.title.as_str()), Some("Gym"));
    }

    #[test]
    fn test_lock_is_day_scoped() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let lock = PlanLock::locked_on(today);
        assert_eq!(lock.state_on(today), LockState::Locked);
        assert_eq!(lock.state_on(tomorrow), LockState::Unlocked);
        assert_eq!(PlanLock::default().state_on(today), LockState::Unlocked);
    }
}
