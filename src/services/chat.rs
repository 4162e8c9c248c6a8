use crate::audit::prompt::chat_context;
use crate::error::{AppError, Result};
use crate::llm::{GenerationRequest, LlmClient, PersonaConfig};
use crate::models::ChatMessage;
use crate::services::{GoalService, HabitService};
use crate::sync::{merge_history, with_local_fallback, Outcome, Session, Stores};
use std::sync::Arc;

pub const OFFLINE_REPLY: &str =
    "I'm having trouble connecting to my AI services right now. Check that GEMINI_API_KEY or \
     GROQ_API_KEY is configured, then try again.";

/// Free-form conversation with the persona, grounded in the user's goals
/// and today's habit progress.
pub struct ChatService {
    stores: Stores,
    llm: Arc<LlmClient>,
    persona: PersonaConfig,
    habits: Arc<HabitService>,
    goals: Arc<GoalService>,
}

impl ChatService {
    pub fn new(
        stores: Stores,
        llm: Arc<LlmClient>,
        persona: PersonaConfig,
        habits: Arc<HabitService>,
        goals: Arc<GoalService>,
    ) -> Self {
        Self {
            stores,
            llm,
            persona,
            habits,
            goals,
        }
    }

    pub async fn history(&self, session: &Session) -> Result<Vec<ChatMessage>> {
        let local = self.stores.local.load_chat(session.storage_key_owner())?;

        let remote = match self.stores.remote_for(session) {
            Some((db, user_id)) => match db.list_messages(user_id).await {
                Ok(messages) => Some(messages),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Failed to fetch remote messages");
                    None
                }
            },
            None => None,
        };

        Ok(merge_history(session, local, remote))
    }

    /// Sends one user message and returns the persona's reply. Provider
    /// failure yields a fixed offline reply rather than an error.
    pub async fn send(&self, session: &Session, text: &str) -> Result<Outcome<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("Message cannot be empty".to_string()));
        }

        let earlier = self.history(session).await?;
        self.append(session, ChatMessage::user(text)).await?;

        let habits = self.habits.list(session).await?;
        let goals = self.goals.list(session).await?;
        let request = GenerationRequest::new(
            self.persona.system_prompt(&chat_context(&goals, &habits)),
            text,
        )
        .with_history(&earlier);

        let reply = match self.llm.generate(&request).await {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Chat providers failed, sending offline reply");
                OFFLINE_REPLY.to_string()
            }
        };

        self.append(session, ChatMessage::assistant(reply)).await
    }

    async fn append(&self, session: &Session, message: ChatMessage) -> Result<Outcome<ChatMessage>> {
        let owner = session.storage_key_owner();
        with_local_fallback(
            session,
            || {
                let mut messages = self.stores.local.load_chat(owner)?;
                messages.push(message.clone());
                self.stores.local.save_chat(owner, &messages)?;
                Ok(message.clone())
            },
            self.stores
                .remote_for(session)
                .map(|(db, user_id)| db.save_message(user_id, &message)),
        )
        .await
    }
}
