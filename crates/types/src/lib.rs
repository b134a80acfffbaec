//! persona-bot 的核心数据类型与存储接口定义

pub mod models;
pub mod storage;

pub use models::{ChatTurn, MemoryDocument, MemoryHit};
pub use storage::{MemoryStore, TurnStore};
