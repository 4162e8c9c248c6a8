use super::AuditInput;
use crate::llm::{GenerationRequest, PersonaConfig};
use crate::models::{completed_count, Goal, Habit, FIRST_HOUR, LAST_HOUR};

fn join_or(items: impl Iterator<Item = String>, empty: &str) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        empty.to_string()
    } else {
        joined
    }
}

fn schedule_window() -> String {
    format!("{:02}:00 to {:02}:00", FIRST_HOUR, LAST_HOUR + 1)
}

/// Context block spliced into the chat system prompt.
pub fn chat_context(goals: &[Goal], habits: &[Habit]) -> String {
    format!(
        "\nCURRENT CONTEXT:\n- Intentions: {}\n- Current performance: {}/{} non-negotiables completed today.\n",
        join_or(goals.iter().map(|g| format!("\"{}\"", g.title)), "No defined vision"),
        completed_count(habits),
        habits.len()
    )
}

pub fn daily_audit(persona: &PersonaConfig, input: &AuditInput<'_>) -> GenerationRequest {
    let completed = join_or(
        input.habits.iter().filter(|h| h.completed).map(|h| h.text.clone()),
        "NONE",
    );
    let missed = join_or(
        input.habits.iter().filter(|h| !h.completed).map(|h| h.text.clone()),
        "NONE",
    );
    let goals = join_or(
        input
            .goals
            .iter()
            .map(|g| format!("{} ({}, {}% complete)", g.title, g.category, g.progress)),
        "NONE",
    );

    let user_prompt = format!(
        r#"Analyze the user's day and prepare tomorrow.

DAY DATA:
- Reflection: "{reflection}"
- Energy: {energy}/5
- Mood: {mood}
- Habits completed: {completed}
- Habits missed: {missed}
- Completion rate: {rate:.0}%
- Active goals: {goals}

AUDIT PROTOCOL:
{rubric}
5. The schedule: a full day from {window}, one block per hour, no gaps. Include rest.

VOICE: {voice}

Return ONLY valid JSON:
{{
  "text": "markdown analysis",
  "score": <0-100>,
  "didTodayCount": <true/false>,
  "schedule": [
    {{"start": "06:00", "title": "Morning Routine", "type": "mission"}},
    {{"start": "07:00", "title": "Deep Work", "type": "deep-work"}}
  ]
}}"#,
        reflection = input.reflection,
        energy = input.energy,
        mood = input.mood,
        completed = completed,
        missed = missed,
        rate = input.habit_completion_rate(),
        goals = goals,
        rubric = persona.scoring_rubric,
        window = schedule_window(),
        voice = persona.chat_voice,
    );

    GenerationRequest::new(
        format!(
            "You are {} You grade the user's day. Return ONLY valid JSON.",
            persona.chat_voice
        ),
        user_prompt,
    )
    .json()
}

pub fn initial_plan(persona: &PersonaConfig, role: &str, pain: &str) -> GenerationRequest {
    let user_prompt = format!(
        r#"You are helping a new user ({role}) who is dealing with {pain}.

TASK: design their first day plan. Make it feel doable but exciting.

REQUIREMENTS:
1. A schedule from {window}. Every hour has a purpose, including rest.
2. 3 simple habits that help them start small against {pain}.

Return ONLY valid JSON:
{{
  "message": "a warm welcome",
  "habits": ["Habit 1", "Habit 2", "Habit 3"],
  "schedule": [
    {{"start": "06:00", "title": "Morning Lift-Off", "type": "mission"}}
  ]
}}"#,
        role = role,
        pain = pain,
        window = schedule_window(),
    );

    GenerationRequest::new(
        format!("You are {} You build first-day plans. Return ONLY valid JSON.", persona.chat_voice),
        user_prompt,
    )
    .json()
}

pub fn goal_audit(persona: &PersonaConfig, title: &str, description: &str) -> GenerationRequest {
    let user_prompt = format!(
        r#"Help refine this goal.
Title: "{title}"
Description: "{description}"

CRITERIA:
- Is it small enough to act on this week?
- Is it realistic?
- Does it have a deadline?

Return ONLY valid JSON:
{{
  "isSmart": <true/false>,
  "feedback": "how to make it better",
  "suggestions": ["adjustment 1", "adjustment 2"]
}}"#
    );

    GenerationRequest::new(
        format!("You are {} Return ONLY valid JSON.", persona.chat_voice),
        user_prompt,
    )
    .json()
}
