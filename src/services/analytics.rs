use crate::models::{DailyLogEntry, Stats};
use serde::{Deserialize, Serialize};

const POTENTIAL_FLOOR: u32 = 88;
const POTENTIAL_HEADROOM: u32 = 15;
const EMPTY_TREND_DAYS: u32 = 7;
const MEANINGFUL_REFLECTION_CHARS: usize = 50;
const HIGH_IMPACT_SCORE: u8 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub average_score: u32,
    pub potential_target: u32,
    pub points: Vec<TrendPoint>,
}

/// Average and chart points, oldest day first. With no history the chart
/// shows a flat week.
pub fn trend_summary(history: &[DailyLogEntry]) -> TrendSummary {
    if history.is_empty() {
        return TrendSummary {
            average_score: 0,
            potential_target: POTENTIAL_FLOOR,
            points: (1..=EMPTY_TREND_DAYS)
                .map(|n| TrendPoint {
                    label: n.to_string(),
                    score: 0,
                })
                .collect(),
        };
    }

    let mut ordered: Vec<&DailyLogEntry> = history.iter().collect();
    ordered.sort_by_key(|e| e.date);

    let total: u32 = ordered.iter().map(|e| u32::from(e.productivity_score)).sum();
    let average_score = (f64::from(total) / ordered.len() as f64).round() as u32;

    TrendSummary {
        average_score,
        potential_target: (average_score + POTENTIAL_HEADROOM).max(POTENTIAL_FLOOR),
        points: ordered
            .iter()
            .map(|e| TrendPoint {
                label: e.date.format("%d").to_string(),
                score: e.productivity_score,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeKind {
    Streak,
    Achievement,
    Badge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: BadgeKind,
}

/// Progress toward a badge not yet earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingBadge {
    pub title: &'static str,
    pub requirement: &'static str,
    pub current: u32,
    pub target: u32,
}

struct Rule {
    badge: Badge,
    unlocked: fn(&Progress) -> bool,
}

struct Progress {
    streak: u32,
    total_score: u32,
    deep_reflections: usize,
    high_impact_days: usize,
}

impl Progress {
    fn measure(stats: Option<&Stats>, history: &[DailyLogEntry]) -> Self {
        Self {
            streak: stats.map_or(0, |s| s.streak),
            total_score: history.iter().map(|e| u32::from(e.productivity_score)).sum(),
            deep_reflections: history
                .iter()
                .filter(|e| e.reflection.chars().count() > MEANINGFUL_REFLECTION_CHARS)
                .count(),
            high_impact_days: history
                .iter()
                .filter(|e| e.impact_score >= HIGH_IMPACT_SCORE)
                .count(),
        }
    }
}

const fn badge(id: &'static str, title: &'static str, description: &'static str, kind: BadgeKind) -> Badge {
    Badge {
        id,
        title,
        description,
        kind,
    }
}

const RULES: [Rule; 7] = [
    Rule {
        badge: badge("streak-3", "3-Day Streak", "Showed up 3 days in a row", BadgeKind::Streak),
        unlocked: |p| p.streak >= 3,
    },
    Rule {
        badge: badge("streak-7", "Week Warrior", "7 consecutive days of progress", BadgeKind::Streak),
        unlocked: |p| p.streak >= 7,
    },
    Rule {
        badge: badge("streak-30", "Monthly Master", "30 days of consistent action", BadgeKind::Streak),
        unlocked: |p| p.streak >= 30,
    },
    Rule {
        badge: badge("score-100", "First Century", "Reached 100 total points", BadgeKind::Achievement),
        unlocked: |p| p.total_score >= 100,
    },
    Rule {
        badge: badge("score-500", "High Achiever", "Accumulated 500 points", BadgeKind::Achievement),
        unlocked: |p| p.total_score >= 500,
    },
    Rule {
        badge: badge("reflection-5", "Deep Thinker", "Wrote 5 meaningful reflections", BadgeKind::Badge),
        unlocked: |p| p.deep_reflections >= 5,
    },
    Rule {
        badge: badge("impact-3", "Impact Maker", "3 days with 80+ Impact Score", BadgeKind::Achievement),
        unlocked: |p| p.high_impact_days >= 3,
    },
];

pub fn rewards(stats: Option<&Stats>, history: &[DailyLogEntry]) -> Vec<Badge> {
    let progress = Progress::measure(stats, history);
    RULES
        .iter()
        .filter(|rule| (rule.unlocked)(&progress))
        .map(|rule| rule.badge.clone())
        .collect()
}

pub fn upcoming_rewards(stats: Option<&Stats>, history: &[DailyLogEntry]) -> Vec<UpcomingBadge> {
    let progress = Progress::measure(stats, history);
    [
        ("Week Warrior", "7-day streak", progress.streak, 7),
        ("Monthly Master", "30-day streak", progress.streak, 30),
        ("High Achiever", "500 total points", progress.total_score, 500),
    ]
    .into_iter()
    .filter(|(_, _, current, target)| current < target)
    .map(|(title, requirement, current, target)| UpcomingBadge {
        title,
        requirement,
        current,
        target,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn entry(day: u32, score: u8, reflection: &str) -> DailyLogEntry {
        let now = Utc::now();
        DailyLogEntry {
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            reflection: reflection.to_string(),
            energy: 3,
            mood: "Steady".to_string(),
            productivity_score: score,
            impact_score: score,
            did_today_count: score > 60,
            report: String::new(),
            schedule: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn stats(streak: u32) -> Stats {
        Stats {
            score: 70,
            streak,
            last_active: Utc::now(),
        }
    }

    #[test]
    fn test_empty_history_trend() {
        let summary = trend_summary(&[]);
        assert_eq!(summary.average_score, 0);
        assert_eq!(summary.potential_target, 88);
        assert_eq!(summary.points.len(), 7);
        assert_eq!(summary.points[0].label, "1");
        assert_eq!(summary.points[6].label, "7");
    }

    #[test]
    fn test_trend_is_chronological_and_rounded() {
        let history = vec![entry(3, 90, ""), entry(1, 70, ""), entry(2, 81, "")];
        let summary = trend_summary(&history);

        assert_eq!(summary.average_score, 80);
        assert_eq!(summary.potential_target, 95);
        let labels: Vec<_> = summary.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["01", "02", "03"]);
    }

    #[test]
    fn test_rewards_thresholds() {
        assert!(rewards(None, &[]).is_empty());

        let long = "a".repeat(51);
        let history: Vec<_> = (1..=5).map(|d| entry(d, 85, &long)).collect();
        let titles: Vec<_> = rewards(Some(&stats(7)), &history).iter().map(|b| b.title).collect();

        assert_eq!(
            titles,
            vec!["3-Day Streak", "Week Warrior", "First Century", "Deep Thinker", "Impact Maker"]
        );
    }

    #[test]
    fn test_short_reflections_do_not_count() {
        let history: Vec<_> = (1..=5).map(|d| entry(d, 10, &"a".repeat(50))).collect();
        assert!(rewards(None, &history).is_empty());
    }

    #[test]
    fn test_upcoming_hides_earned() {
        let upcoming = upcoming_rewards(Some(&stats(8)), &[]);
        let titles: Vec<_> = upcoming.iter().map(|u| u.title).collect();
        assert_eq!(titles, vec!["Monthly Master", "High Achiever"]);
        assert_eq!(upcoming[0].current, 8);
    }
}
