use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use bot_providers::{ChatOptions, ProviderConfig};

/// 模型服务配置（[embedding] 与 [llm] 两个表共用）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// 供应商名称（如 "ollama"、"openai"）
    pub provider: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// 默认模型；对话模型按人格覆盖
    #[serde(default)]
    pub model: String,
    /// 向量维度（仅 embedding 服务需要）
    #[serde(default)]
    pub dimension: Option<usize>,
}

impl ServiceConfig {
    /// 展开为 embedding provider 配置
    pub fn to_embed_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider_name: self.provider.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            dimension: self.dimension,
            ..ProviderConfig::default()
        }
    }

    /// 展开为 chat provider 配置，模型与生成参数取自人格
    pub fn to_chat_config(&self, persona: &PersonaConfig) -> ProviderConfig {
        ProviderConfig {
            provider_name: self.provider.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: persona.model.clone(),
            dimension: None,
            stream: persona.stream,
            options: ChatOptions {
                temperature: persona.temperature,
                num_predict: persona.num_predict,
                repeat_last_n: persona.repeat_last_n,
            },
        }
    }
}

/// 单个人格配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaConfig {
    /// 人格名称，同时作为回调路径与数据目录名
    pub name: String,

    /// 对话模型（覆盖 [llm].model）
    pub model: String,

    /// 系统提示词模板文件，支持 {user_name} / {time} 占位符
    pub prompt_file: PathBuf,

    /// 记忆段落的引导语
    #[serde(default = "default_memory_label")]
    pub memory_label: String,

    /// 语义记忆检索条数（0 表示关闭检索，写入不受影响）
    #[serde(default = "default_memory_top_k")]
    pub memory_top_k: usize,

    /// 近期对话窗口大小（0 表示关闭）
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub num_predict: Option<i32>,

    #[serde(default)]
    pub repeat_last_n: Option<i32>,

    /// 流式传输（仅 Ollama 支持关闭；false 时一次性读取整个回复体）
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// {time} 占位符使用的时区偏移（小时）
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// LINE channel secret（签名校验由上游反向代理负责）
    #[serde(default)]
    pub channel_secret: String,

    /// LINE channel access token，可用环境变量覆盖
    #[serde(default)]
    pub channel_access_token: String,
}

impl PersonaConfig {
    /// channel access token：环境变量 {NAME}_LINE_CHANNEL_ACCESS_TOKEN 优先
    pub fn resolved_access_token(&self) -> Result<String> {
        let env_key = format!(
            "{}_LINE_CHANNEL_ACCESS_TOKEN",
            self.name.to_uppercase().replace('-', "_")
        );
        if let Ok(token) = std::env::var(&env_key) {
            if !token.is_empty() {
                return Ok(token);
            }
        }
        anyhow::ensure!(
            !self.channel_access_token.is_empty(),
            "Missing channel access token for persona '{}' (set {} or channel_access_token)",
            self.name,
            env_key
        );
        Ok(self.channel_access_token.clone())
    }
}

fn default_memory_label() -> String {
    "The following is your conversation with the user:".to_string()
}

fn default_memory_top_k() -> usize {
    10
}

fn default_history_size() -> usize {
    30
}

fn default_stream() -> bool {
    true
}

fn default_utc_offset_hours() -> i32 {
    8
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 各人格数据目录的根目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    pub embedding: ServiceConfig,

    pub llm: ServiceConfig,

    #[serde(rename = "persona", default)]
    pub personas: Vec<PersonaConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    /// 人格名称同时用作回调路径与数据目录名，重名会互相覆盖，启动时直接报错
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for persona in &self.personas {
            anyhow::ensure!(
                seen.insert(persona.name.as_str()),
                "Duplicate persona name: '{}'",
                persona.name
            );
        }
        Ok(())
    }

    pub fn persona(&self, name: &str) -> Option<&PersonaConfig> {
        self.personas.iter().find(|p| p.name == name)
    }
}
