//! 基于 LanceDB 的本地存储后端
//!
//! 每个人格一个数据库目录，包含 `memories`（向量记忆）与 `turns`（对话日志）
//! 两张表，以及记录 embedding 模型与维度的 metadata.json。

pub mod client;
pub mod db;

pub use client::LocalStore;
