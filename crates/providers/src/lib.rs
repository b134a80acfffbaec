mod common;
mod config;
mod traits;

// 各供应商模块（feature gated）
#[cfg(feature = "ollama")]
mod ollama;
#[cfg(feature = "openai")]
mod openai;

pub use config::ProviderConfig;
pub use traits::{ChatMessage, ChatOptions, ChatProvider, EmbedProvider, Role};

/// 创建 Embedding Provider
pub fn create_embed_provider(config: &ProviderConfig) -> anyhow::Result<Box<dyn EmbedProvider>> {
    let dimension = config
        .dimension
        .ok_or_else(|| anyhow::anyhow!("Missing 'dimension' for embed provider"))?;

    match config.provider_name.as_str() {
        #[cfg(feature = "ollama")]
        "ollama" => ollama::embed::create(config, dimension),
        #[cfg(feature = "openai")]
        "openai" => openai::embed::create(config, dimension),
        other => anyhow::bail!("Unknown or disabled embed provider: {}", other),
    }
}

/// 创建 Chat Provider（模型与生成参数在 config 中按人格给定）
pub fn create_chat_provider(config: &ProviderConfig) -> anyhow::Result<Box<dyn ChatProvider>> {
    match config.provider_name.as_str() {
        #[cfg(feature = "ollama")]
        "ollama" => Ok(Box::new(ollama::chat::OllamaChatProvider::new(config)?)),
        #[cfg(feature = "openai")]
        "openai" => Ok(Box::new(openai::chat::create(config)?)),
        other => anyhow::bail!("Unknown or disabled chat provider: {}", other),
    }
}
