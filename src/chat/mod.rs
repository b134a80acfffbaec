pub mod engine;
pub mod prompt;

use std::sync::Arc;

use anyhow::{Context, Result};
use bot_local::LocalStore;
use bot_providers::{ChatProvider, EmbedProvider};

use crate::config::{AppConfig, PersonaConfig};

pub use engine::{ChatEngine, PersonaSettings};

/// 按配置组装一个人格的对话引擎（进程启动时构建一次）
pub async fn build_engine(config: &AppConfig, persona: &PersonaConfig) -> Result<ChatEngine> {
    let prompt_template = std::fs::read_to_string(&persona.prompt_file).with_context(|| {
        format!(
            "Failed to read prompt file: {}",
            persona.prompt_file.display()
        )
    })?;

    let embedder: Arc<dyn EmbedProvider> =
        Arc::from(bot_providers::create_embed_provider(&config.embedding.to_embed_config())?);
    let llm: Arc<dyn ChatProvider> =
        Arc::from(bot_providers::create_chat_provider(&config.llm.to_chat_config(persona))?);

    let data_path = config.data_dir.join(&persona.name);
    let store = Arc::new(
        LocalStore::connect(&data_path, &config.embedding.model, embedder.dimension()).await?,
    );

    let settings = PersonaSettings {
        name: persona.name.clone(),
        model: persona.model.clone(),
        prompt_template,
        memory_label: persona.memory_label.clone(),
        memory_top_k: persona.memory_top_k,
        history_size: persona.history_size,
        utc_offset_hours: persona.utc_offset_hours,
    };

    Ok(ChatEngine::new(
        settings,
        embedder,
        llm,
        store.clone(),
        store,
    ))
}

/// `persona-bot chat` 子命令：本地跑一轮完整的对话流程
pub async fn run_once(
    config_path: &str,
    persona_name: &str,
    message: &str,
    user_name: &str,
    user_id: &str,
) -> Result<()> {
    let config = AppConfig::load(std::path::Path::new(config_path))?;
    let persona = config
        .persona(persona_name)
        .with_context(|| format!("Unknown persona: {}", persona_name))?;

    let engine = build_engine(&config, persona).await?;
    let reply = engine.chat(message, user_name, user_id).await?;
    println!("{}", reply);
    Ok(())
}
