use crate::models::{DailyResult, Stats};
use chrono::{DateTime, Utc};

pub const MAX_SCORE: u8 = 100;

/// Weight of the previous momentum score, in tenths. The new day's score
/// gets the remaining `10 - HISTORY_WEIGHT_TENTHS`.
const HISTORY_WEIGHT_TENTHS: u32 = 4;

/// Whole calendar days between the last activity and the scored date.
pub fn diff_days(result_date: chrono::NaiveDate, last_active: DateTime<Utc>) -> i64 {
    (result_date - last_active.date_naive()).num_days()
}

pub fn next_streak(prev_streak: u32, diff_days: i64, did_today_count: bool) -> u32 {
    if !did_today_count {
        return 0;
    }
    match diff_days {
        1 => prev_streak.saturating_add(1),
        d if d > 1 => 1,
        // Same-day resubmission (or a backdated one): hold, never double count.
        _ => prev_streak.max(1),
    }
}

/// `floor(prev * 0.4 + today * 0.6)`, computed in integer tenths, clamped.
pub fn next_score(prev_score: u8, productivity_score: u8) -> u8 {
    let prev = u32::from(prev_score.min(MAX_SCORE));
    let today = u32::from(productivity_score.min(MAX_SCORE));
    let weighted = (prev * HISTORY_WEIGHT_TENTHS + today * (10 - HISTORY_WEIGHT_TENTHS)) / 10;
    weighted.min(u32::from(MAX_SCORE)) as u8
}

pub fn apply_daily_result(
    prev: Option<&Stats>,
    result: &DailyResult,
    now: DateTime<Utc>,
) -> Stats {
    let productivity = result.productivity_score.min(MAX_SCORE);

    match prev {
        None => Stats {
            score: productivity,
            streak: u32::from(result.did_today_count),
            last_active: now,
        },
        Some(prev) => {
            let diff = diff_days(result.date, prev.last_active);
            Stats {
                score: next_score(prev.score, productivity),
                streak: next_streak(prev.streak, diff, result.did_today_count),
                last_active: now,
            }
        }
    }
}
