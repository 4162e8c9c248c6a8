use super::{AuditInput, AuditResult, AuditSource, InitialPlan};
use crate::llm::ProviderError;
use crate::models::{
    completed_count, format_hour, parse_hour, sort_events, GoalAudit, PlanEvent,
    MAX_EVENTS_PER_DAY,
};
use serde_json::Value;

/// Score threshold above which a day counts when the reply omits a verdict.
pub const COUNTED_THRESHOLD: u8 = 60;

const DEFAULT_BLOCK_TITLE: &str = "Focus Block";

/// Accepts a JSON number or a numeric string, rounds and clamps to 0..=100.
pub fn coerce_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Turns a provider reply into an audit result. A reply without usable
/// `text` or `score` is rejected so the next tier gets a turn.
pub fn normalize_audit(value: &Value) -> Result<AuditResult, ProviderError> {
    let text = non_empty_str(value, "text")
        .ok_or_else(|| ProviderError::MalformedJson("missing text".to_string()))?;

    let score = value
        .get("score")
        .and_then(coerce_score)
        .ok_or_else(|| ProviderError::MalformedJson("missing or invalid score".to_string()))?;

    let did_today_count = value
        .get("didTodayCount")
        .or_else(|| value.get("did_today_count"))
        .and_then(coerce_bool)
        .unwrap_or(score > COUNTED_THRESHOLD);

    Ok(AuditResult {
        text: text.to_string(),
        score,
        did_today_count,
        schedule: normalize_schedule(value.get("schedule")),
        source: AuditSource::Provider,
    })
}

/// Keeps entries with a parseable start hour, sorted, capped at
/// `MAX_EVENTS_PER_DAY`, with ids `op_<HH>_<n>`.
pub fn normalize_schedule(value: Option<&Value>) -> Vec<PlanEvent> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut events: Vec<PlanEvent> = entries
        .iter()
        .filter_map(|entry| {
            let start = entry.get("start").and_then(Value::as_str)?;
            let title = non_empty_str(entry, "title").unwrap_or(DEFAULT_BLOCK_TITLE);
            let event_type = entry.get("type").and_then(Value::as_str).unwrap_or("");
            let mut event = PlanEvent::new(title, start, event_type)?;
            let start_hour = event.hour();
            if let Some(end) = entry
                .get("end")
                .and_then(Value::as_str)
                .and_then(parse_hour)
                .filter(|end| Some(*end) > start_hour)
            {
                event.end = format_hour(end);
            }
            Some(event)
        })
        .collect();

    sort_events(&mut events);
    events.truncate(MAX_EVENTS_PER_DAY);

    for (n, event) in events.iter_mut().enumerate() {
        let hour = event.hour().unwrap_or_default();
        event.id = format!("op_{:02}_{}", hour, n);
    }

    events
}

pub fn normalize_initial_plan(value: &Value) -> Result<InitialPlan, ProviderError> {
    let message = non_empty_str(value, "message")
        .ok_or_else(|| ProviderError::MalformedJson("missing message".to_string()))?;

    let habits: Vec<String> = value
        .get("habits")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(3)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(InitialPlan {
        message: message.to_string(),
        habits,
        schedule: normalize_schedule(value.get("schedule")),
        source: AuditSource::Provider,
    })
}

pub fn normalize_goal_audit(value: &Value) -> Result<GoalAudit, ProviderError> {
    serde_json::from_value(value.clone()).map_err(|e| ProviderError::MalformedJson(e.to_string()))
}

/// Local verdict used when every provider failed. No network involved.
pub fn fallback_audit(input: &AuditInput<'_>) -> AuditResult {
    let completed = completed_count(input.habits) as u32;
    let base = 40 + u32::from(input.energy) * 10 + completed * 5;
    let score = base.min(100) as u8;
    let rate = input.habit_completion_rate();

    let energy_note = match input.energy {
        e if e >= 4 => "strong momentum",
        3 => "steady effort",
        _ => "you might need more rest",
    };

    let text = format!(
        "**Overall Assessment**\n\nBased on your reflection and {:.0}% habit completion rate, \
         you're making progress. Your energy level of {}/5 suggests {}.\n\n\
         (AI connection lost - manual backup score generated)",
        rate, input.energy, energy_note
    );

    AuditResult {
        text,
        score,
        did_today_count: score > COUNTED_THRESHOLD,
        schedule: Vec::new(),
        source: AuditSource::Fallback,
    }
}

pub fn fallback_initial_plan() -> InitialPlan {
    let schedule = [
        ("06:00", "Wake & Audit", "mission"),
        ("08:00", "Deep Work", "deep-work"),
        ("17:00", "Physical Training", "strength"),
    ]
    .iter()
    .enumerate()
    .filter_map(|(n, (start, title, kind))| {
        let mut event = PlanEvent::new(title, start, kind)?;
        event.id = format!("op_{}_{}", &start[..2], n);
        Some(event)
    })
    .collect();

    InitialPlan {
        message: "I couldn't reach the server, but the standard remains high. Focus on your discipline."
            .to_string(),
        habits: vec![
            "Morning Audit".to_string(),
            "Deep Work Session".to_string(),
            "Physical Training".to_string(),
        ],
        schedule,
        source: AuditSource::Fallback,
    }
}
