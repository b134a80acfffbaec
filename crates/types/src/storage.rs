use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChatTurn, MemoryDocument, MemoryHit};

/// 长期语义记忆存储的统一接口
///
/// 任何存储实现（本地、远程）都应该实现这个 trait。
/// 文档创建后不可变，存储只需要支持追加与按用户过滤的向量检索。
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 获取向量维度
    fn dimension(&self) -> usize;

    /// 获取记录总数
    async fn count(&self) -> Result<usize>;

    /// 插入记忆文档（vector 由外部生成）
    async fn insert(&self, doc: MemoryDocument) -> Result<()>;

    /// 向量搜索，仅返回指定 user_id 的文档，按相似度排序
    async fn search(
        &self,
        vector: Vec<f32>,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryHit>>;
}

/// 对话日志存储的统一接口（仅追加）
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// 指定用户的回合总数
    async fn count(&self, user_id: &str) -> Result<usize>;

    /// 追加一条回合记录
    async fn insert(&self, turn: ChatTurn) -> Result<()>;

    /// 指定用户最近的 limit 条回合，按时间倒序（最新在前）
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatTurn>>;
}
