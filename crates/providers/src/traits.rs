//! Provider Traits

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 对话消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 对话消息（仅在单次请求内构造，不直接持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 生成参数（按人格配置，None 表示使用服务端默认值）
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub num_predict: Option<i32>,
    pub repeat_last_n: Option<i32>,
}

/// Embedding Provider Trait
#[async_trait]
pub trait EmbedProvider: Send + Sync {
    /// 编码单个文本
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// 批量编码文本（顺序保持，一一对应）
    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// 获取向量维度
    fn dimension(&self) -> usize;
}

/// Chat Provider Trait
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 发送完整消息列表，返回单条回复文本
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
