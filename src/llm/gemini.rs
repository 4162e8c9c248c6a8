use super::{GenerationRequest, HistoryRole, ProviderError, TextProvider};
use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatResponseFormat};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client, ModelIden};

/// Primary provider. Talks to Gemini through the `genai` client with the
/// configured key instead of the ambient environment.
pub struct GeminiProvider {
    client: Option<Client>,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let client = api_key.filter(|k| !k.trim().is_empty()).map(|key| {
            let auth_resolver = AuthResolver::from_resolver_fn(
                move |_model_iden: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                    Ok(Some(AuthData::from_single(key.clone())))
                },
            );
            Client::builder().with_auth_resolver(auth_resolver).build()
        });

        Self {
            client,
            model: model.into(),
        }
    }

    fn build_request(request: &GenerationRequest) -> ChatRequest {
        let mut messages: Vec<ChatMessage> = request
            .history
            .iter()
            .map(|m| match m.role {
                HistoryRole::User => ChatMessage::user(m.content.clone()),
                HistoryRole::Assistant => ChatMessage::assistant(m.content.clone()),
            })
            .collect();
        messages.push(ChatMessage::user(request.user_prompt.clone()));

        let chat_req = ChatRequest::new(messages);
        if request.system_prompt.is_empty() {
            chat_req
        } else {
            chat_req.with_system(request.system_prompt.clone())
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProviderError::Unavailable("GEMINI_API_KEY not set".to_string()))?;

        let chat_req = Self::build_request(request);
        let options = if request.json_mode {
            Some(ChatOptions::default().with_response_format(ChatResponseFormat::JsonMode))
        } else {
            None
        };

        let chat_response = client
            .exec_chat(&self.model, chat_req, options.as_ref())
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Gemini request failed: {}", e)))?;

        chat_response
            .content_text_as_str()
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or(ProviderError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_unconfigured() {
        assert!(!GeminiProvider::new(None, "gemini-1.5-flash").is_configured());
        assert!(!GeminiProvider::new(Some(" ".to_string()), "gemini-1.5-flash").is_configured());
        assert!(GeminiProvider::new(Some("k".to_string()), "gemini-1.5-flash").is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_generate_fails_fast() {
        let provider = GeminiProvider::new(None, "gemini-1.5-flash");
        let err = provider
            .generate(&GenerationRequest::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
