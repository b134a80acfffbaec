//! 共享类型和 OpenAI 兼容格式实现

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::traits::{ChatMessage, ChatOptions, ChatProvider, EmbedProvider};

/// 文本规范化：折叠空白，避免排版噪音影响向量
pub(crate) fn normalize_for_embedding(text: &str) -> String {
    let text = text.trim();
    let re = regex::Regex::new(r"\s+").unwrap();
    re.replace_all(text, " ").to_string()
}

/// OpenAI 兼容格式 Embed（供 OpenAI、Ollama 使用）
pub struct OpenaiCompatibleEmbed {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenaiEmbedRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct OpenaiEmbedResponse {
    data: Vec<OpenaiEmbedData>,
}

#[derive(Debug, Deserialize)]
struct OpenaiEmbedData {
    embedding: Vec<f32>,
}

impl OpenaiCompatibleEmbed {
    pub fn new(config: &ProviderConfig, dimension: usize) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbedProvider for OpenaiCompatibleEmbed {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.encode_batch(&[text]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embed API returned no embedding"))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let normalized: Vec<String> = texts.iter().map(|t| normalize_for_embedding(t)).collect();

        let request = OpenaiEmbedRequest {
            model: self.model.clone(),
            input: normalized,
            dimensions: Some(self.dimension),
        };

        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Embed API error ({}): {}", status, error_text);
            anyhow::bail!("Embed API error ({}): {}", status, error_text);
        }

        let embed_response: OpenaiEmbedResponse = response.json().await?;

        if embed_response.data.len() != texts.len() {
            anyhow::bail!(
                "Embed API returned {} embeddings for {} inputs",
                embed_response.data.len(),
                texts.len()
            );
        }

        Ok(embed_response
            .data
            .into_iter()
            .map(|d| d.embedding)
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI 兼容格式 Chat（/chat/completions，非流式）
pub struct OpenaiCompatibleChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct OpenaiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OpenaiChatResponse {
    choices: Vec<OpenaiChatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenaiChatChoice {
    message: OpenaiChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenaiChatChoiceMessage {
    content: String,
}

impl OpenaiCompatibleChat {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            options: config.options.clone(),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenaiCompatibleChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = OpenaiChatRequest {
            model: &self.model,
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.num_predict,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Chat API error ({}): {}", status, error_text);
            anyhow::bail!("Chat API error ({}): {}", status, error_text);
        }

        let chat_response: OpenaiChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat API returned no choices"))
    }
}
