use crate::traits::ChatOptions;

/// Provider 配置
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_name: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Embedding 向量维度（chat provider 不使用）
    pub dimension: Option<usize>,
    /// 流式传输开关（目前仅 Ollama chat 支持非流式）
    pub stream: bool,
    /// 生成参数（embed provider 不使用）
    pub options: ChatOptions,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_name: String::new(),
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            dimension: None,
            stream: true,
            options: ChatOptions::default(),
        }
    }
}
