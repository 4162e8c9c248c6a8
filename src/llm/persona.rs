use serde::{Deserialize, Serialize};

/// Coaching tone. One preset is chosen at startup and feeds every prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaConfig {
    pub name: String,
    /// System prompt for chat. `{context}` is replaced by the user's goals
    /// and habit progress.
    pub system_prompt_template: String,
    /// Grading instructions embedded in the daily audit prompt.
    pub scoring_rubric: String,
    /// Short voice description used by the audit and plan prompts.
    pub chat_voice: String,
}

const BUDDY_SYSTEM: &str = r#"You are "Buddy", the helpful, encouraging and slightly playful dog companion of the Antigravity productivity platform.

YOUR MANDATE: help the user defy gravity (their own inertia) through positive reinforcement, clear guidance and gentle nudges.

BUDDY'S RULES:
1. POSITIVITY FIRST: even when they fail, focus on what we can fetch next time.
2. MICRO-WINS: celebrate every small action.
3. THE DAILY FETCH: encourage the evening reflection.
4. GENTLE NUDGES: use "Woof!" as a playful attention-getter, never aggressive commands.
5. NO JARGON: break complex goals into bite-sized treats.
{context}
RESPONSE PROTOCOL:
- Be warm, supportive and helpful.
- Focus on the IMMEDIATE NEXT ACTION that is easiest to do.
- End every message with an encouraging phrase or a question."#;

const BUDDY_RUBRIC: &str = r#"1. Verdict: did we move forward today? (didTodayCount true/false)
2. The encouraging truth: celebrate what was done, gently name what to fetch tomorrow.
3. Momentum score 0-100: fair, encouraging but realistic.
4. Mission tasks: 2 simple things for tomorrow."#;

const COACH_SYSTEM: &str = r#"You are a calm, experienced performance coach inside the Antigravity platform.

Speak plainly and briefly. Anchor every answer in the user's stated goals and today's habit progress. Prefer one concrete next step over a list of ideas.
{context}
Close with a single question that moves the user to act within the next hour."#;

const COACH_RUBRIC: &str = r#"1. Verdict: did the day advance a stated goal? (didTodayCount true/false)
2. Evidence: cite what in the reflection supports the verdict.
3. Momentum score 0-100: 50 is an ordinary day, 80+ needs deep work plus all habits.
4. Adjustments: 2 specific changes for tomorrow."#;

const DRILL_SYSTEM: &str = r#"You are Fetch, the no-excuses drill instructor of the Antigravity platform.

You do not accept excuses. You respect output. Short sentences. Direct orders. No insults about identity, only about behaviour.
{context}
End with a command for the next block of work."#;

const DRILL_RUBRIC: &str = r#"1. Verdict: did today count? (didTodayCount true/false). Missed non-negotiables mean NO unless the reflection proves otherwise.
2. The hard truth: name the weakest moment of the day.
3. Momentum score 0-100: be strict, 70+ must be earned.
4. Orders: 2 non-negotiable actions for tomorrow."#;

impl PersonaConfig {
    pub fn buddy() -> Self {
        Self {
            name: "buddy".to_string(),
            system_prompt_template: BUDDY_SYSTEM.to_string(),
            scoring_rubric: BUDDY_RUBRIC.to_string(),
            chat_voice: "BUDDY, a smart, loyal and helpful dog. Warm, bite-sized, supportive. Use dog metaphors naturally and focus on momentum and joy.".to_string(),
        }
    }

    pub fn coach() -> Self {
        Self {
            name: "coach".to_string(),
            system_prompt_template: COACH_SYSTEM.to_string(),
            scoring_rubric: COACH_RUBRIC.to_string(),
            chat_voice: "a calm performance coach. Plain, brief, evidence-based.".to_string(),
        }
    }

    pub fn drill() -> Self {
        Self {
            name: "drill".to_string(),
            system_prompt_template: DRILL_SYSTEM.to_string(),
            scoring_rubric: DRILL_RUBRIC.to_string(),
            chat_voice: "FETCH, a no-excuses drill instructor. Short, direct, demanding.".to_string(),
        }
    }

    /// Looks up a preset by name, falling back to `buddy`.
    pub fn by_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "coach" => Self::coach(),
            "drill" | "fetch" => Self::drill(),
            "buddy" => Self::buddy(),
            other => {
                tracing::warn!("Unknown persona '{}', using buddy", other);
                Self::buddy()
            }
        }
    }

    pub fn system_prompt(&self, context: &str) -> String {
        self.system_prompt_template.replace("{context}", context)
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self::buddy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(PersonaConfig::by_name("Coach").name, "coach");
        assert_eq!(PersonaConfig::by_name("fetch").name, "drill");
        assert_eq!(PersonaConfig::by_name("nobody").name, "buddy");
    }

    #[test]
    fn test_context_is_inlined() {
        let prompt = PersonaConfig::coach().system_prompt("\nGOALS: Run 5k\n");
        assert!(prompt.contains("GOALS: Run 5k"));
        assert!(!prompt.contains("{context}"));
    }
}
