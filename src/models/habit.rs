use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A daily non-negotiable. Countable habits carry a target quantity and unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub target_quantity: Option<u32>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub last_completed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHabit {
    pub text: String,
    pub target_quantity: Option<u32>,
    pub unit: Option<String>,
}

impl Habit {
    pub fn new(user_id: &str, new_habit: NewHabit) -> Self {
        let countable = new_habit.target_quantity.filter(|t| *t > 0);
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            text: new_habit.text.trim().to_string(),
            completed: false,
            streak: 0,
            target_quantity: countable,
            quantity: countable.map(|_| 0),
            unit: new_habit.unit.filter(|u| !u.trim().is_empty()),
            last_completed_date: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_countable(&self) -> bool {
        self.target_quantity.is_some()
    }

    /// Flips completion. Completing bumps the habit's own streak at most once
    /// per calendar day.
    pub fn toggle(&mut self, today: NaiveDate) {
        if self.completed {
            self.completed = false;
        } else {
            self.mark_completed(today);
        }
    }

    /// Records progress on a countable habit; reaching the target completes it.
    pub fn set_quantity(&mut self, quantity: u32, today: NaiveDate) {
        self.quantity = Some(quantity);
        match self.target_quantity {
            Some(target) if quantity >= target => {
                if !self.completed {
                    self.mark_completed(today);
                }
            }
            Some(_) => self.completed = false,
            None => {}
        }
    }

    /// Clears completion for a new day. The streak survives only when the
    /// habit was last completed yesterday or today.
    pub fn reset_for_new_day(&mut self, today: NaiveDate) {
        let yesterday = today.checked_sub_days(Days::new(1));
        let still_alive = match self.last_completed_date {
            Some(last) => last == today || Some(last) == yesterday,
            None => false,
        };
        if !still_alive {
            self.streak = 0;
        }
        self.completed = false;
        if self.is_countable() {
            self.quantity = Some(0);
        }
    }

    fn mark_completed(&mut self, today: NaiveDate) {
        self.completed = true;
        if self.last_completed_date == Some(today) {
            return;
        }
        let yesterday = today.checked_sub_days(Days::new(1));
        self.streak = if self.last_completed_date.is_some() && self.last_completed_date == yesterday {
            self.streak + 1
        } else {
            1
        };
        self.last_completed_date = Some(today);
    }
}

pub fn completed_count(habits: &[Habit]) -> usize {
    habits.iter().filter(|h| h.completed).count()
}
