pub mod normalize;
pub mod prompt;

use crate::llm::{extract_json, LlmClient, PersonaConfig};
use crate::models::{completed_count, Goal, GoalAudit, Habit, PlanEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct AuditInput<'a> {
    pub reflection: &'a str,
    pub energy: u8,
    pub mood: &'a str,
    pub goals: &'a [Goal],
    pub habits: &'a [Habit],
}

impl AuditInput<'_> {
    /// Percentage of habits completed; 0 when there are none.
    pub fn habit_completion_rate(&self) -> f32 {
        if self.habits.is_empty() {
            return 0.0;
        }
        completed_count(self.habits) as f32 / self.habits.len() as f32 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub text: String,
    pub score: u8,
    #[serde(rename = "didTodayCount")]
    pub did_today_count: bool,
    pub schedule: Vec<PlanEvent>,
    pub source: AuditSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialPlan {
    pub message: String,
    pub habits: Vec<String>,
    pub schedule: Vec<PlanEvent>,
    pub source: AuditSource,
}

pub struct AuditEngine {
    llm: Arc<LlmClient>,
    persona: PersonaConfig,
}

impl AuditEngine {
    pub fn new(llm: Arc<LlmClient>, persona: PersonaConfig) -> Self {
        Self { llm, persona }
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub async fn run_daily_audit(&self, input: &AuditInput<'_>) -> AuditResult {
        let request = prompt::daily_audit(&self.persona, input);

        match self
            .llm
            .generate_with(&request, |raw| normalize::normalize_audit(&extract_json(raw)?))
            .await
        {
            Ok(result) => {
                tracing::info!(score = result.score, counted = result.did_today_count, "Daily audit complete");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "All providers failed, using local audit");
                normalize::fallback_audit(input)
            }
        }
    }

    pub async fn initial_plan(&self, role: &str, pain: &str) -> InitialPlan {
        let request = prompt::initial_plan(&self.persona, role, pain);

        self.llm
            .generate_with(&request, |raw| normalize::normalize_initial_plan(&extract_json(raw)?))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Initial plan generation failed, using default plan");
                normalize::fallback_initial_plan()
            })
    }

    pub async fn goal_audit(&self, title: &str, description: &str) -> GoalAudit {
        let request = prompt::goal_audit(&self.persona, title, description);

        self.llm
            .generate_with(&request, |raw| normalize::normalize_goal_audit(&extract_json(raw)?))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Goal audit failed");
                GoalAudit::fallback()
            })
    }
}
