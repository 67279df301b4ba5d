//! Backend for Ollama's native API.
//!
//! [`OllamaBackend`] maps a normalized [`LlmRequest`] onto `/api/generate`
//! (prompt only) or `/api/chat` (when a system prompt is set). This is the
//! default backend of [`BackendClient`](crate::client::BackendClient).

use super::{parse_retry_after, Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for Ollama's native API.
#[derive(Debug, Clone, Default)]
pub struct OllamaBackend;

impl OllamaBackend {
    /// Build the Ollama `options` object from the request config.
    fn build_options(request: &LlmRequest) -> Value {
        let mut opts = json!({
            "temperature": request.config.temperature,
            "num_predict": request.config.max_tokens,
        });
        if request.config.thinking {
            opts["extended_thinking"] = json!(true);
        }
        if let Some(ref custom) = request.config.options {
            if let (Some(base), Some(extra)) = (opts.as_object_mut(), custom.as_object()) {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
        }
        opts
    }

    fn system_prompt(request: &LlmRequest) -> Option<&str> {
        request
            .system_prompt
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    /// Build `(path, body)` for the request.
    fn build_call(request: &LlmRequest) -> (&'static str, Value) {
        match Self::system_prompt(request) {
            Some(system) => (
                "/api/chat",
                json!({
                    "model": request.model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": request.prompt},
                    ],
                    "stream": false,
                    "options": Self::build_options(request),
                }),
            ),
            None => (
                "/api/generate",
                json!({
                    "model": request.model,
                    "prompt": request.prompt,
                    "stream": false,
                    "options": Self::build_options(request),
                }),
            ),
        }
    }

    /// Pull the completion text out of either endpoint's response shape.
    fn extract_text(json_resp: &Value) -> String {
        json_resp
            .get("message")
            .and_then(|m| m.get("content"))
            .or_else(|| json_resp.get("response"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// Keep the token counts and timings Ollama reports.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let meta: serde_json::Map<String, Value> = [
            "model",
            "total_duration",
            "eval_count",
            "eval_duration",
            "prompt_eval_count",
        ]
        .iter()
        .filter_map(|key| json_resp.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect();

        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let (path, body) = Self::build_call(request);
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);

        let resp = client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }

        let json_resp: Value = resp.json().await?;
        Ok(LlmResponse {
            text: Self::extract_text(&json_resp),
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
