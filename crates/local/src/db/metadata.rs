use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 数据库元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Embedding 模型名称
    pub model: String,
    /// 向量维度
    pub dimension: usize,
    /// 数据库创建时间
    pub created_at: DateTime<Utc>,
    /// 元数据格式版本
    pub version: String,
}

impl DatabaseMetadata {
    /// 创建新的元数据
    pub fn new(model: String, dimension: usize) -> Self {
        Self {
            model,
            dimension,
            created_at: Utc::now(),
            version: "1.0".to_string(),
        }
    }

    /// 从数据目录加载元数据，不存在时写入并返回新的
    pub fn load_or_create(data_path: &Path, model: &str, dimension: usize) -> Result<Self> {
        if Self::exists(data_path) {
            Self::load(data_path)
        } else {
            let metadata = Self::new(model.to_string(), dimension);
            metadata.save(data_path)?;
            Ok(metadata)
        }
    }

    /// 从数据目录加载元数据
    pub fn load(data_path: &Path) -> Result<Self> {
        let metadata_path = data_path.join("metadata.json");

        let content = std::fs::read_to_string(&metadata_path).with_context(|| {
            format!("Failed to read metadata file: {}", metadata_path.display())
        })?;

        let metadata: Self =
            serde_json::from_str(&content).with_context(|| "Failed to parse metadata file")?;

        Ok(metadata)
    }

    /// 保存元数据到数据目录
    pub fn save(&self, data_path: &Path) -> Result<()> {
        let metadata_path = data_path.join("metadata.json");

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize metadata")?;

        std::fs::write(&metadata_path, content).with_context(|| {
            format!("Failed to write metadata file: {}", metadata_path.display())
        })?;

        Ok(())
    }

    /// 验证维度是否匹配
    pub fn validate_dimension(&self, expected_dimension: usize) -> Result<()> {
        if self.dimension != expected_dimension {
            anyhow::bail!(
                "Vector dimension mismatch!\n\
                 Database dimension: {} (model: {})\n\
                 Current embedding model dimension: {}\n\
                 \n\
                 The persona data was embedded with a different model. To switch\n\
                 models, delete the persona's data directory and let the bot\n\
                 rebuild its memory, or switch back to: {}",
                self.dimension,
                self.model,
                expected_dimension,
                self.model
            );
        }
        Ok(())
    }

    /// 检查元数据文件是否存在
    pub fn exists(data_path: &Path) -> bool {
        data_path.join("metadata.json").exists()
    }
}
