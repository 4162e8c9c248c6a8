use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub is_premium: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_trial_used: bool,
    pub momentum_score: u8,
    pub streak: u32,
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied by the identity provider at sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
}

impl User {
    /// First sign-in: premium for the length of the trial.
    pub fn with_trial(profile: UserProfile, trial_days: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id: profile.user_id,
            name: profile.name,
            email: profile.email,
            picture: profile.picture,
            is_premium: true,
            trial_ends_at: Some(now + Duration::days(trial_days)),
            is_trial_used: true,
            momentum_score: 0,
            streak: 0,
            created_at: now,
        }
    }

    /// Whole days of trial remaining, rounded up.
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        match self.trial_ends_at {
            Some(ends) if ends > now => {
                let secs = (ends - now).num_seconds();
                (secs + 86_399) / 86_400
            }
            _ => 0,
        }
    }

    pub fn has_premium(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.trial_ends_at.map_or(true, |ends| ends > now)
    }
}

/// Rolling momentum state folded forward by each daily result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub score: u8,
    pub streak: u32,
    pub last_active: DateTime<Utc>,
}

/// The slice of a daily log the momentum updater consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyResult {
    pub date: NaiveDate,
    pub productivity_score: u8,
    pub did_today_count: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            user_id: "user_1".to_string(),
            name: "Explorer".to_string(),
            email: "e@example.com".to_string(),
            picture: String::new(),
        }
    }

    #[test]
    fn test_trial_grants_premium() {
        let now = Utc::now();
        let user = User::with_trial(profile(), 7, now);
        assert!(user.has_premium(now));
        assert_eq!(user.days_left(now), 7);
        assert_eq!(user.days_left(now + Duration::hours(1)), 7);
        assert_eq!(user.days_left(now + Duration::days(6) + Duration::hours(1)), 1);
    }

    #[test]
    fn test_expired_trial() {
        let now = Utc::now();
        let user = User::with_trial(profile(), 7, now);
        let later = now + Duration::days(8);
        assert!(!user.has_premium(later));
        assert_eq!(user.days_left(later), 0);
    }
}
