use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.line.me/v2/bot";

/// LINE Messaging API 客户端（回复消息、查询用户资料）
pub struct LineClient {
    client: Client,
    access_token: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl LineClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Self::with_base_url(access_token, API_BASE)
    }

    pub fn with_base_url(access_token: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
            base_url: base_url.to_string(),
        })
    }

    /// 查询用户显示名称
    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile> {
        let url = format!("{}/profile/{}", self.base_url, user_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send profile request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("LINE profile API error ({}): {}", status, error_text);
        }

        Ok(response.json().await?)
    }

    /// 用 reply token 回复一条文本消息
    pub async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let request = ReplyRequest {
            reply_token,
            messages: vec![TextMessage {
                message_type: "text",
                text,
            }],
        };

        let url = format!("{}/message/reply", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .context("Failed to send reply request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("LINE reply API error ({}): {}", status, error_text);
        }

        Ok(())
    }
}
