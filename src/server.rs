use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::chat::{self, ChatEngine};
use crate::config::{AppConfig, PersonaConfig};
use crate::line::{LineClient, TextMessageEvent, WebhookEnvelope};

/// 单个人格的运行时句柄
pub struct Bot {
    pub engine: ChatEngine,
    pub line: LineClient,
}

#[derive(Clone)]
pub struct AppState {
    bots: Arc<HashMap<String, Arc<Bot>>>,
}

pub async fn serve(config_path: &str) -> Result<()> {
    let config = AppConfig::load(std::path::Path::new(config_path))?;
    anyhow::ensure!(
        !config.personas.is_empty(),
        "No [[persona]] configured in {}",
        config_path
    );

    let mut bots = HashMap::new();
    for persona in &config.personas {
        let bot = build_bot(&config, persona).await?;
        tracing::info!(
            "persona '{}' ready at POST /callback/{}",
            persona.name,
            persona.name
        );
        bots.insert(persona.name.clone(), Arc::new(bot));
    }

    let state = AppState {
        bots: Arc::new(bots),
    };

    let app = Router::new()
        .route("/callback/{persona}", post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl-C handler: {}", e);
        return;
    }
    tracing::info!("shutdown signal received");
}

async fn build_bot(config: &AppConfig, persona: &PersonaConfig) -> Result<Bot> {
    if persona.channel_secret.is_empty() {
        tracing::warn!(
            "persona '{}' has no channel_secret configured; make sure webhook \
             signature verification happens upstream",
            persona.name
        );
    }

    let engine = chat::build_engine(config, persona).await?;
    let token = persona.resolved_access_token()?;
    let line = LineClient::new(&token)?;
    Ok(Bot { engine, line })
}

/// LINE 回调入口：一个请求体可能带多个事件，逐个处理
async fn handle_webhook(
    State(state): State<AppState>,
    Path(persona): Path<String>,
    body: String,
) -> Result<&'static str, StatusCode> {
    let Some(bot) = state.bots.get(&persona) else {
        return Err(StatusCode::NOT_FOUND);
    };

    let envelope: WebhookEnvelope = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(persona = %persona, "invalid webhook body: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    for event in &envelope.events {
        let Some(message) = event.as_text_message() else {
            continue;
        };
        if let Err(e) = handle_message(bot, &message).await {
            tracing::error!(persona = %persona, "webhook event failed: {:#}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok("OK")
}

async fn handle_message(bot: &Bot, message: &TextMessageEvent<'_>) -> Result<()> {
    let profile = bot.line.get_profile(message.user_id).await?;
    let reply = bot
        .engine
        .chat(message.text, &profile.display_name, message.user_id)
        .await?;
    bot.line.reply(message.reply_token, &reply).await?;
    Ok(())
}
