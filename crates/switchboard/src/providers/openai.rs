use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::base::{FragmentStream, Provider};
use super::wire::{messages_to_wire, parse_chunk, tools_to_wire};
use crate::errors::{EngineError, EngineResult};
use crate::models::message::Message;
use crate::models::tool::ToolDefinition;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| EngineError::Provider(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn post_stream(&self, payload: serde_json::Value) -> EngineResult<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::Provider(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(EngineError::Provider(format!(
                    "request failed: {status}: {body}"
                )))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> EngineResult<FragmentStream> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_wire(messages),
            "stream": true,
        });
        let object = payload.as_object_mut().unwrap();
        if !tools.is_empty() {
            object.insert("tools".to_string(), json!(tools_to_wire(tools)));
        }
        if let Some(temp) = self.config.temperature {
            object.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            object.insert("max_tokens".to_string(), json!(tokens));
        }

        let response = self.post_stream(payload).await?;
        let mut body = response.bytes_stream();

        // Network reads split lines, and multi-byte characters, at
        // arbitrary byte boundaries. Buffer raw bytes and only decode
        // complete lines; a UTF-8 sequence never spans a newline.
        Ok(Box::pin(try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            'read: while let Some(bytes) = body.next().await {
                let bytes = bytes
                    .map_err(|e| EngineError::Provider(format!("stream read failed: {e}")))?;
                buffer.extend_from_slice(&bytes);

                while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    let line = String::from_utf8_lossy(&line);
                    let Some(data) = line.trim().strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        break 'read;
                    }
                    yield parse_chunk(data)?;
                }
            }
            debug!("completion stream ended");
        }))
    }
}
