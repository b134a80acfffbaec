//! Ollama 原生 Chat（/api/chat，NDJSON 流式累积）

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::traits::{ChatMessage, ChatOptions, ChatProvider};

pub struct OllamaChatProvider {
    client: Client,
    base_url: String,
    model: String,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_last_n: Option<i32>,
}

/// 流式响应的单个分片；done 分片可能不带 message
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChatProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            stream: config.stream,
            options: config.options.clone(),
        })
    }

    fn apply_chunk(chunk: OllamaChatChunk, output: &mut String) -> Result<bool> {
        if let Some(error) = chunk.error {
            anyhow::bail!("Ollama chat error: {}", error);
        }
        if let Some(message) = chunk.message {
            output.push_str(&message.content);
        }
        Ok(chunk.done)
    }
}

#[async_trait]
impl ChatProvider for OllamaChatProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: self.stream,
            options: OllamaOptions {
                temperature: self.options.temperature,
                num_predict: self.options.num_predict,
                repeat_last_n: self.options.repeat_last_n,
            },
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Ollama chat API error ({}): {}", status, error_text);
            anyhow::bail!("Ollama chat API error ({}): {}", status, error_text);
        }

        // 非流式：整个回复在单个 JSON 体里
        if !self.stream {
            let chunk: OllamaChatChunk = response
                .json()
                .await
                .context("Invalid chat response body")?;
            let mut output = String::new();
            Self::apply_chunk(chunk, &mut output)?;
            return Ok(output);
        }

        // NDJSON：一行一个分片，把增量 content 拼成最终回复
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut output = String::new();

        while let Some(bytes) = stream.try_next().await? {
            buffer.extend_from_slice(&bytes);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = std::str::from_utf8(&line)
                    .context("Invalid UTF-8 in chat stream")?
                    .trim();
                if line.is_empty() {
                    continue;
                }

                let chunk: OllamaChatChunk = serde_json::from_str(line)
                    .with_context(|| format!("Invalid chat stream chunk: {}", line))?;
                if Self::apply_chunk(chunk, &mut output)? {
                    return Ok(output);
                }
            }
        }

        // 结尾可能有一行没有换行符的分片
        let tail = std::str::from_utf8(&buffer)
            .context("Invalid UTF-8 in chat stream")?
            .trim();
        if !tail.is_empty() {
            let chunk: OllamaChatChunk = serde_json::from_str(tail)
                .with_context(|| format!("Invalid chat stream chunk: {}", tail))?;
            Self::apply_chunk(chunk, &mut output)?;
        }

        Ok(output)
    }
}
