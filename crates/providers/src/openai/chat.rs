//! OpenAI Chat（/chat/completions）

use anyhow::Result;

use crate::common::OpenaiCompatibleChat;
use crate::config::ProviderConfig;

pub fn create(config: &ProviderConfig) -> Result<OpenaiCompatibleChat> {
    OpenaiCompatibleChat::new(config)
}
