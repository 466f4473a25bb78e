//! Google Gemini `generateContent` client.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::budget::TokenUsage;
use crate::llm::AsyncLlmCaller;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;
use crate::types::{Citation, LlmResponse, Message, ToolCall};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiCaller {
    client:            reqwest::Client,
    api_key:           String,
    api_base:          String,
    max_output_tokens: Option<u32>,
}

impl GeminiCaller {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client:            reqwest::Client::new(),
            api_key:           api_key.into(),
            api_base:          DEFAULT_API_BASE.to_string(),
            max_output_tokens: None,
        }
    }

    pub fn with_base_url(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = Some(n);
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }

    /// Converts the transcript into Gemini `contents`.
    fn build_contents(messages: &[Message]) -> Vec<Value> {
        let mut contents = Vec::new();

        for msg in messages {
            match msg {
                Message::User { content } => {
                    contents.push(json!({
                        "role": "user",
                        "parts": [{ "text": content }]
                    }));
                }
                Message::Model { content, tool_calls } => {
                    let mut parts = Vec::new();
                    if let Some(text) = content.as_ref().filter(|t| !t.is_empty()) {
                        parts.push(json!({ "text": text }));
                    }
                    for tc in tool_calls {
                        parts.push(json!({
                            "functionCall": { "name": tc.name, "args": tc.args }
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(json!({ "role": "model", "parts": parts }));
                    }
                }
                Message::Tool { results } => {
                    let parts: Vec<Value> = results.iter().map(|r| {
                        let response = if r.success {
                            let out = r.output.strip_prefix("SUCCESS: ").unwrap_or(&r.output);
                            json!({ "result": out })
                        } else {
                            let out = r.output.strip_prefix("ERROR: ").unwrap_or(&r.output);
                            json!({ "error": out })
                        };
                        json!({
                            "functionResponse": { "name": r.tool_name, "response": response }
                        })
                    }).collect();

                    contents.push(json!({ "role": "user", "parts": parts }));
                }
            }
        }

        contents
    }

    /// Builds the request body for one `generateContent` call.
    fn build_request_body(&self, memory: &AgentMemory, tools: &ToolRegistry) -> Value {
        let mut body = json!({ "contents": Self::build_contents(&memory.messages) });

        if !memory.system_prompt.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": memory.system_prompt }] });
        }

        let mut tool_entries = Vec::new();

        let declarations: Vec<Value> = tools.function_schemas().into_iter().map(|s| {
            let mut decl = json!({ "name": s.name, "description": s.description });
            // Gemini rejects an object schema with no properties; omit it instead.
            let has_params = s.input_schema.get("properties")
                .and_then(|p| p.as_object())
                .map_or(false, |p| !p.is_empty());
            if has_params {
                decl["parameters"] = s.input_schema;
            }
            decl
        }).collect();

        if !declarations.is_empty() {
            tool_entries.push(json!({ "functionDeclarations": declarations }));
        }
        if tools.has_builtin_search() {
            tool_entries.push(json!({ "google_search": {} }));
        }
        if !tool_entries.is_empty() {
            body["tools"] = Value::Array(tool_entries);
        }

        if let Some(n) = self.max_output_tokens {
            body["generationConfig"] = json!({ "maxOutputTokens": n });
        }

        body
    }

    fn parse_response(parsed: GenerateContentResponse) -> Result<LlmResponse, String> {
        let usage = parsed.usage_metadata.map(|u| {
            TokenUsage::new(u.prompt_token_count, u.candidates_token_count + u.thoughts_token_count)
        });

        let candidate = match parsed.candidates.into_iter().next() {
            Some(c) => c,
            None => {
                let reason = parsed.prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates".to_string());
                return Err(format!("Gemini returned no candidates (block_reason={})", reason));
            }
        };

        let parts = match candidate.content {
            Some(content) if !content.parts.is_empty() => content.parts,
            _ => {
                return Err(format!(
                    "Gemini returned no content (finish_reason={})",
                    candidate.finish_reason.unwrap_or_else(|| "unknown".to_string())
                ));
            }
        };

        let mut text = String::new();
        let mut calls = Vec::new();

        for part in parts {
            if let Some(fc) = part.function_call {
                let args: HashMap<String, Value> = match fc.args {
                    Some(Value::Null) | None => HashMap::new(),
                    Some(v) => serde_json::from_value(v)
                        .map_err(|e| format!("Invalid function call args for '{}': {}", fc.name, e))?,
                };
                calls.push(ToolCall { name: fc.name, args, id: fc.id });
            } else if let Some(t) = part.text {
                if !part.thought {
                    text.push_str(&t);
                }
            }
        }

        // Function calls take priority over any accompanying text
        if !calls.is_empty() {
            return Ok(LlmResponse::ToolCalls { tools: calls, usage });
        }

        let mut citations: Vec<Citation> = Vec::new();
        if let Some(meta) = candidate.grounding_metadata {
            for chunk in meta.grounding_chunks {
                if let Some(WebChunk { uri: Some(uri), title }) = chunk.web {
                    if !citations.iter().any(|c| c.uri == uri) {
                        citations.push(Citation { title, uri });
                    }
                }
            }
        }

        Ok(LlmResponse::FinalAnswer { content: text, citations, usage })
    }
}

#[async_trait]
impl AsyncLlmCaller for GeminiCaller {
    async fn call_async(
        &self,
        memory: &AgentMemory,
        tools:  &ToolRegistry,
        model:  &str,
    ) -> Result<LlmResponse, String> {
        let body = self.build_request_body(memory, tools);

        tracing::debug!(
            agent    = %memory.agent_name,
            model,
            messages = memory.messages.len(),
            tools    = tools.len(),
            "calling Gemini"
        );

        let response = self.client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type",   "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body   = response.text().await.unwrap_or_default();
            return Err(format!("Gemini API error {}: {}", status, body));
        }

        let parsed: GenerateContentResponse = response.json()
            .await
            .map_err(|e| format!("Failed to parse Gemini response: {}", e))?;

        Self::parse_response(parsed)
    }
}

// ── Gemini response types ────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates:      Vec<Candidate>,
    usage_metadata:  Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content:            Option<Content>,
    finish_reason:      Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text:          Option<String>,
    function_call: Option<FunctionCall>,
    #[serde(default)]
    thought:       bool,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    args: Option<Value>,
    id:   Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count:     u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    thoughts_token_count:   u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri:   Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
