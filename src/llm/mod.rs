pub mod gemini;
pub mod groq;
pub mod persona;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use persona::PersonaConfig;

use crate::config::ProvidersConfig;
use crate::models::{ChatMessage, ChatRole};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

/// Messages of prior conversation sent along with a request.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Empty response content")]
    EmptyContent,

    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

impl From<&ChatMessage> for HistoryMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: match message.role {
                ChatRole::User => HistoryRole::User,
                ChatRole::Assistant => HistoryRole::Assistant,
            },
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<HistoryMessage>,
    pub user_prompt: String,
    pub json_mode: bool,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            ..Default::default()
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Keeps only the last `HISTORY_LIMIT` messages.
    pub fn with_history(mut self, history: &[ChatMessage]) -> Self {
        let skip = history.len().saturating_sub(HISTORY_LIMIT);
        self.history = history[skip..].iter().map(HistoryMessage::from).collect();
        self
    }
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    fn id(&self) -> &str;

    /// False when no credentials are configured; the chain skips it.
    fn is_configured(&self) -> bool;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Providers in fixed priority order, tried one at a time.
pub struct LlmClient {
    providers: Vec<Arc<dyn TextProvider>>,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Gemini first, then Groq.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let providers: Vec<Arc<dyn TextProvider>> = vec![
            Arc::new(GeminiProvider::new(
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
            )),
            Arc::new(GroqProvider::new(
                config.groq_base_url.clone(),
                config.groq_model.clone(),
                config.groq_api_key.clone(),
            )),
        ];
        Self::new(providers, Duration::from_secs(config.timeout_secs.max(1)))
    }

    pub fn has_configured_provider(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Plain text from the first provider that answers with non-empty content.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.generate_with(request, |text| {
            if text.trim().is_empty() {
                Err(ProviderError::EmptyContent)
            } else {
                Ok(text.to_string())
            }
        })
        .await
    }

    /// Runs the chain, handing each raw reply to `accept`. A rejected reply
    /// counts as that provider failing and the next one is tried.
    pub async fn generate_with<T, F>(
        &self,
        request: &GenerationRequest,
        accept: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn(&str) -> Result<T, ProviderError>,
    {
        let mut last_error = ProviderError::Unavailable("no provider configured".to_string());

        for provider in self.providers.iter().filter(|p| p.is_configured()) {
            let outcome = match tokio::time::timeout(self.timeout, provider.generate(request)).await {
                Ok(Ok(text)) => accept(&text),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(value) => {
                    tracing::debug!(provider = provider.id(), "Provider answered");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(provider = provider.id(), error = %e, "Provider failed, trying next");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

fn code_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").ok())
        .as_ref()
}

/// Parses a JSON object out of a model reply. Models sometimes wrap the
/// payload in a markdown code block.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ProviderError> {
    let cleaned = code_fence()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    if cleaned.is_empty() {
        return Err(ProviderError::EmptyContent);
    }

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| ProviderError::MalformedJson(e.to_string()))?;

    if !value.is_object() {
        return Err(ProviderError::MalformedJson("expected a JSON object".to_string()));
    }

    Ok(value)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub enum Script {
        Reply(String),
        Fail,
        Hang,
    }

    /// Provider that plays back canned replies and records each request.
    pub struct ScriptedProvider {
        pub name: String,
        pub configured: bool,
        script: Mutex<Vec<Script>>,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(name: &str, script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: true,
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn unconfigured(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                configured: false,
                script: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn replying(name: &str, reply: &str) -> Arc<Self> {
            Self::new(name, vec![Script::Reply(reply.to_string())])
        }

        pub fn failing(name: &str) -> Arc<Self> {
            Self::new(name, vec![Script::Fail])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        fn id(&self) -> &str {
            &self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.remove(0)
                } else {
                    match script.first() {
                        Some(Script::Reply(text)) => Script::Reply(text.clone()),
                        Some(Script::Hang) => Script::Hang,
                        Some(Script::Fail) | None => Script::Fail,
                    }
                }
            };

            match next {
                Script::Reply(text) => Ok(text),
                Script::Fail => Err(ProviderError::RequestFailed(format!("{} is down", self.name))),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::RequestFailed("unreachable".to_string()))
                }
            }
        }
    }

    pub fn client(providers: Vec<Arc<ScriptedProvider>>) -> LlmClient {
        LlmClient::new(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn TextProvider>)
                .collect(),
            Duration::from_millis(200),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        let plain = extract_json(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(plain["text"], "hi");

        let fenced = extract_json("Here you go:\n```json\n{\"score\": 70}\n```\nBye").unwrap();
        assert_eq!(fenced["score"], 70);

        let bare_fence = extract_json("```\n{\"ok\": true}\n```").unwrap();
        assert_eq!(bare_fence["ok"], true);

        assert!(matches!(extract_json("not json"), Err(ProviderError::MalformedJson(_))));
        assert!(matches!(extract_json("[1, 2]"), Err(ProviderError::MalformedJson(_))));
        assert!(matches!(extract_json("   "), Err(ProviderError::EmptyContent)));
    }

    #[test]
    fn test_history_is_truncated() {
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage::user(format!("m{}", i)))
            .collect();
        let request = GenerationRequest::new("sys", "now").with_history(&history);
        assert_eq!(request.history.len(), HISTORY_LIMIT);
        assert_eq!(request.history[0].content, "m5");
        assert_eq!(request.history[9].content, "m14");
    }

    #[tokio::test]
    async fn test_chain_falls_through_in_order() {
        let primary = ScriptedProvider::failing("primary");
        let secondary = ScriptedProvider::replying("secondary", "hello");
        let llm = client(vec![primary.clone(), secondary.clone()]);

        let text = llm.generate(&GenerationRequest::new("s", "u")).await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = ScriptedProvider::replying("primary", "first");
        let secondary = ScriptedProvider::replying("secondary", "second");
        let llm = client(vec![primary.clone(), secondary.clone()]);

        assert_eq!(llm.generate(&GenerationRequest::new("s", "u")).await.unwrap(), "first");
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_providers_are_skipped() {
        let primary = ScriptedProvider::unconfigured("primary");
        let llm = client(vec![primary.clone()]);

        assert!(!llm.has_configured_provider());
        let err = llm.generate(&GenerationRequest::new("s", "u")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_reply_moves_to_next_provider() {
        let primary = ScriptedProvider::replying("primary", "not json at all");
        let secondary = ScriptedProvider::replying("secondary", r#"{"text": "ok"}"#);
        let llm = client(vec![primary, secondary]);

        let value = llm
            .generate_with(&GenerationRequest::new("s", "u").json(), extract_json)
            .await
            .unwrap();
        assert_eq!(value["text"], "ok");
    }

    #[tokio::test]
    async fn test_hanging_provider_times_out() {
        let primary = ScriptedProvider::new("primary", vec![Script::Hang]);
        let secondary = ScriptedProvider::replying("secondary", "late but fine");
        let llm = client(vec![primary, secondary]);

        let text = llm.generate(&GenerationRequest::new("s", "u")).await.unwrap();
        assert_eq!(text, "late but fine");
    }

    #[tokio::test]
    async fn test_empty_reply_is_a_failure() {
        let llm = client(vec![ScriptedProvider::replying("primary", "   ")]);
        let err = llm.generate(&GenerationRequest::new("s", "u")).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyContent));
    }
}
