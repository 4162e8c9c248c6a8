use super::{GenerationRequest, HistoryRole, ProviderError, TextProvider};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

pub struct GroqProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GroqProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &GenerationRequest) -> CompletionBody {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(WireMessage {
            role: "system",
            content: request.system_prompt.clone(),
        });
        for m in &request.history {
            messages.push(WireMessage {
                role: match m.role {
                    HistoryRole::User => "user",
                    HistoryRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: request.user_prompt.clone(),
        });

        CompletionBody {
            model: self.model.clone(),
            messages,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl TextProvider for GroqProvider {
    fn id(&self) -> &str {
        "groq"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::Unavailable("GROQ_API_KEY not set".to_string()))?;

        let response = self
            .client
            .post(self.chat_completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedJson(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    fn provider() -> GroqProvider {
        GroqProvider::new(
            "https://api.groq.com/openai/v1/",
            "llama-3.3-70b-versatile",
            Some("key".to_string()),
        )
    }

    #[test]
    fn test_url_and_configuration() {
        let p = provider();
        assert_eq!(
            p.chat_completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert!(p.is_configured());
        assert!(!GroqProvider::new("http://x", "m", None).is_configured());
    }

    #[test]
    fn test_body_shape() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("woof")];
        let request = GenerationRequest::new("be kind", "plan my day")
            .with_history(&history)
            .json();

        let body = serde_json::to_value(provider().build_body(&request)).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "plan my day");
        assert_eq!(body["response_format"]["type"], "json_object");

        let plain = serde_json::to_value(provider().build_body(&GenerationRequest::new("s", "u"))).unwrap();
        assert!(plain.get("response_format").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"{\"text\":\"ok\"}"}}]}"#)
                .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(r#"{"text":"ok"}"#)
        );
    }
}
