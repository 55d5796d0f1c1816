use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OllamaLlmConfig;
use crate::error::MemoryError;

/// 从对话中提取事实的系统提示词
const FACT_EXTRACTION_PROMPT: &str = r#"You extract durable personal facts from a user message so they can be remembered in later conversations.
Keep only preferences, personal details, plans and other information worth remembering.
Write each fact as a short standalone sentence, in the same language as the input.
Reply with JSON only, in the form {"facts": ["fact one", "fact two"]}.
If there is nothing worth remembering, reply with {"facts": []}."#;

/// Ollama 聊天客户端（记忆库内部用于提取事实）
pub struct OllamaLlm {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct Facts {
    #[serde(default)]
    facts: Vec<String>,
}

impl OllamaLlm {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &OllamaLlmConfig) -> Self {
        Self::new(&config.ollama_base_url, &config.model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 单轮对话
    ///
    /// # 参数
    /// - `system`: 系统提示词
    /// - `user`: 用户消息
    /// - `format`: 传 `Some("json")` 让模型只输出 JSON
    pub async fn chat(
        &self,
        system: &str,
        user: &str,
        format: Option<&str>,
    ) -> Result<String, MemoryError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %self.model, "sending chat request");

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            format,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(MemoryError::Ollama {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.message.content)
    }

    /// 从文本中提取值得记住的事实
    pub async fn extract_facts(&self, text: &str) -> Result<Vec<String>, MemoryError> {
        let content = self
            .chat(FACT_EXTRACTION_PROMPT, text, Some("json"))
            .await?;
        Ok(parse_facts(&content))
    }
}

/// 解析模型输出；无法解析时视为没有事实
fn parse_facts(content: &str) -> Vec<String> {
    match serde_json::from_str::<Facts>(content.trim()) {
        Ok(parsed) => parsed
            .facts
            .into_iter()
            .map(|fact| fact.trim().to_string())
            .filter(|fact| !fact.is_empty())
            .collect(),
        Err(err) => {
            warn!(error = %err, "could not parse extracted facts, skipping");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_facts() {
        assert_eq!(
            parse_facts(r#"{"facts": ["喜欢乌龙茶", "  住在杭州 ", ""]}"#),
            vec!["喜欢乌龙茶".to_string(), "住在杭州".to_string()]
        );
        assert!(parse_facts(r#"{"facts": []}"#).is_empty());
        assert!(parse_facts("{}").is_empty());
        assert!(parse_facts("I could not find anything").is_empty());
    }

    #[tokio::test]
    async fn test_extract_facts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "gemma2:2b",
                "stream": false,
                "format": "json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gemma2:2b",
                "message": {
                    "role": "assistant",
                    "content": "{\"facts\": [\"Name is Alex\", \"Allergic to peanuts\"]}"
                },
                "done": true
            })))
            .mount(&server)
            .await;

        let llm = OllamaLlm::new(&server.uri(), "gemma2:2b");
        let facts = llm
            .extract_facts("Hi, I'm Alex and I'm allergic to peanuts.")
            .await
            .unwrap();

        assert_eq!(facts, vec!["Name is Alex", "Allergic to peanuts"]);
    }

    #[tokio::test]
    async fn test_chat_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
            .mount(&server)
            .await;

        let llm = OllamaLlm::new(&server.uri(), "gemma3:27b");
        let err = llm.chat("system", "hello", None).await.unwrap_err();

        assert!(matches!(err, MemoryError::Ollama { status: 500, .. }));
    }
}
