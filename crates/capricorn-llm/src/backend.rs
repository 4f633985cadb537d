//! LLM backend trait and concrete implementations.
//!
//! Backends:
//!   GeminiBackend           Google Gemini API (gemini-2.0-flash, 1.5-pro, …)
//!   OpenAiCompatibleBackend any OpenAI-compatible endpoint (Ollama, vLLM,
//!                           LMStudio, OpenRouter, …)
//!
//! Both also serve embeddings for the corpus similarity search.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("Empty response from model {0}")]
    EmptyResponse(String),
}

impl LlmError {
    /// True for upstream quota exhaustion, the only error class worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimitExceeded(_) => true,
            LlmError::ApiError { status, message } => {
                *status == 429 || message.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl LlmRequest {
    /// Single user-turn request.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message { role: "user".to_string(), content: prompt.into() }],
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Concatenated message text, for logging and hashing.
    pub fn prompt_text(&self) -> String {
        self.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError>;
    fn model_id(&self) -> &str;
    fn max_output_tokens(&self) -> usize;
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn build_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> Result<LlmResponse, LlmError> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::EmptyResponse(fallback_model.to_string()))?
        .to_string();
    Ok(LlmResponse {
        content,
        model: json["model"]
            .as_str()
            .unwrap_or(fallback_model)
            .to_string(),
        prompt_tokens:     json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    })
}

/// Map HTTP status and error bodies into `LlmError`. 429 and
/// `RESOURCE_EXHAUSTED` become `RateLimitExceeded`.
async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    let body: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) if status < 400 => return Err(LlmError::Serde(e)),
        Err(_) => serde_json::json!({ "message": text }),
    };
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        let api_status = body["error"]["status"].as_str().unwrap_or("");
        if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
            return Err(LlmError::RateLimitExceeded(format!("{} {}", status, msg)));
        }
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

fn parse_embeddings(items: Option<&Vec<serde_json::Value>>, key: &str) -> Result<Vec<Vec<f32>>, LlmError> {
    let Some(items) = items else {
        return Err(LlmError::EmptyResponse("embedding".to_string()));
    };
    items
        .iter()
        .map(|item| Ok(serde_json::from_value(item[key].clone())?))
        .collect()
}

// ── 1. Google Gemini ──────────────────────────────────────────────────────────

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Harm categories sent with every request, all with blocking switched off.
/// Case notes and articles describe disease and treatment toxicity in detail.
const GEMINI_HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// `generateContent` body. A system message becomes `systemInstruction`;
/// assistant turns use Gemini's `model` role.
fn gemini_request_body(req: &LlmRequest) -> serde_json::Value {
    let mut system = None;
    let mut contents = Vec::with_capacity(req.messages.len());
    for m in &req.messages {
        match m.role.as_str() {
            "system" => system = Some(m.content.as_str()),
            "assistant" => contents.push(serde_json::json!({ "role": "model", "parts": [{ "text": m.content }] })),
            _ => contents.push(serde_json::json!({ "role": "user", "parts": [{ "text": m.content }] })),
        }
    }

    let safety: Vec<serde_json::Value> = GEMINI_HARM_CATEGORIES
        .iter()
        .map(|category| serde_json::json!({ "category": category, "threshold": "OFF" }))
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": {
            "maxOutputTokens": req.max_tokens.unwrap_or(8192),
            "temperature": req.temperature.unwrap_or(0.0),
            "topP": req.top_p.unwrap_or(0.95),
            "responseModalities": ["TEXT"],
        },
        "safetySettings": safety,
    });
    if let Some(text) = system {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": text }] });
    }
    body
}

pub struct GeminiBackend {
    pub model: String,
    pub embedding_model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-004".to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            client: build_client(Duration::from_secs(120))?,
        })
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let body = gemini_request_body(&req);

        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;

        let content: String = json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();
        if content.is_empty() {
            let reason = json["candidates"][0]["finishReason"].as_str().unwrap_or("no candidates");
            return Err(LlmError::EmptyResponse(format!("{} ({})", model, reason)));
        }

        let usage = &json["usageMetadata"];
        Ok(LlmResponse {
            content,
            model: model.to_string(),
            prompt_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
        })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.embedding_model, self.api_key
        );
        let model_path = format!("models/{}", self.embedding_model);
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| serde_json::json!({ "model": model_path, "content": { "parts": [{ "text": text }] } }))
            .collect();

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        parse_embeddings(json["embeddings"].as_array(), "values")
    }

    fn model_id(&self) -> &str { &self.model }
    fn max_output_tokens(&self) -> usize { 8_192 }
}

// ── 2. OpenAI-Compatible (Ollama, vLLM, LMStudio, OpenRouter, …) ─────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    pub embedding_model: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            embedding_model: None,
            api_key,
            client: build_client(Duration::from_secs(120))?,
        })
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model":       req.model.as_deref().unwrap_or(&self.model),
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(8192),
            "temperature": req.temperature.unwrap_or(0.0),
            "top_p":       req.top_p.unwrap_or(0.95),
        });
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        parse_openai_response(&json, &self.model)
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        let emb_model = self.embedding_model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({"model": emb_model, "input": texts});
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        parse_embeddings(json["data"].as_array(), "embedding")
    }

    fn model_id(&self) -> &str { &self.model }
    fn max_output_tokens(&self) -> usize { 8_192 }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_backend_model() {
        let b = GeminiBackend::new("AIza-test", "gemini-2.0-flash-001").unwrap();
        assert_eq!(b.model_id(), "gemini-2.0-flash-001");
        assert_eq!(b.embedding_model, "text-embedding-004");
    }

    #[test]
    fn test_gemini_body_maps_roles_and_disables_blocking() {
        let mut req = LlmRequest::user("Case notes:\nJMML").with_top_p(0.9);
        req.messages.insert(0, Message { role: "system".into(), content: "Be terse.".into() });
        req.messages.push(Message { role: "assistant".into(), content: "ok".into() });

        let body = gemini_request_body(&req);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be terse.");
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        let top_p = body["generationConfig"]["topP"].as_f64().unwrap();
        assert!((top_p - 0.9).abs() < 1e-6);
        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert!(safety.iter().all(|s| s["threshold"] == "OFF"));
    }

    #[test]
    fn test_gemini_base_url_trailing_slash() {
        let b = GeminiBackend::new("k", "m").unwrap().with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(b.base_url, "http://localhost:9999/v1beta");
    }

    #[test]
    fn test_openai_compatible_with_no_key() {
        let b = OpenAiCompatibleBackend::new("http://localhost:11434", "llama3:8b", None).unwrap();
        // No API key is valid for Ollama / vLLM
        assert_eq!(b.model_id(), "llama3:8b");
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(LlmError::RateLimitExceeded("429".into()).is_rate_limited());
        assert!(LlmError::ApiError { status: 429, message: "slow down".into() }.is_rate_limited());
        assert!(LlmError::ApiError {
            status: 400,
            message: "429 RESOURCE_EXHAUSTED quota".into()
        }
        .is_rate_limited());
        assert!(!LlmError::ApiError { status: 500, message: "internal".into() }.is_rate_limited());
        assert!(!LlmError::Unavailable("down".into()).is_rate_limited());
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "model": "llama3",
            "choices": [{"message": {"content": "{\"a\":1}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        });
        let r = parse_openai_response(&json, "fallback").unwrap();
        assert_eq!(r.content, "{\"a\":1}");
        assert_eq!(r.prompt_tokens, 10);
    }

    #[test]
    fn test_parse_openai_response_without_choices_is_empty() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(parse_openai_response(&json, "m"), Err(LlmError::EmptyResponse(_))));
    }

    #[test]
    fn test_user_request_builder() {
        let req = LlmRequest::user("hello").with_temperature(0.0).with_max_tokens(10);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.temperature, Some(0.0));
        assert_eq!(req.max_tokens, Some(10));
        assert_eq!(req.prompt_text(), "hello");
    }
}
