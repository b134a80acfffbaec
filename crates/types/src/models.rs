use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一次完整对话回合的日志记录（仅追加，创建后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    /// 生成回复所用的模型标识
    pub model: String,
    pub user_id: String,
    pub user_input: String,
    pub response: String,
    pub t: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(model: &str, user_id: &str, user_input: &str, response: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model: model.to_string(),
            user_id: user_id.to_string(),
            user_input: user_input.to_string(),
            response: response.to_string(),
            t: Utc::now(),
        }
    }
}

/// 向量化的长期记忆文档（vector 由外部 Embedding 生成）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub id: String,
    /// 记忆分区键：检索时只返回同一 user_id 的文档
    pub user_id: String,
    /// 格式化后的回合摘要文本
    pub content: String,
    pub vector: Vec<f32>,
    pub t: DateTime<Utc>,
}

impl MemoryDocument {
    pub fn new(user_id: &str, content: String, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content,
            vector,
            t: Utc::now(),
        }
    }
}

/// 记忆检索结果（不含向量本体）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub id: String,
    pub content: String,
    pub t: DateTime<Utc>,
    /// 相似度分数，越大越相近；后端未提供时为 None
    pub score: Option<f32>,
}
