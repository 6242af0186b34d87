//! 决策引擎层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{Completion, LlmClient, LlmError};

use crate::config::LlmSection;

/// 根据 [llm] 配置创建决策引擎
pub fn create_client_from_config(cfg: &LlmSection) -> Result<Arc<dyn LlmClient>, LlmError> {
    match cfg.provider.as_str() {
        "mock" => {
            tracing::info!("Using mock decision engine");
            Ok(Arc::new(MockLlmClient::new()))
        }
        "openai" => {
            let api_key = std::env::var(&cfg.api_key_env).ok();
            tracing::info!(
                model = %cfg.model,
                base_url = cfg.base_url.as_deref().unwrap_or("default"),
                "Using OpenAI-compatible decision engine"
            );
            let client = OpenAiClient::new(cfg.base_url.as_deref(), &cfg.model, api_key.as_deref())
                .with_temperature(cfg.temperature)
                .with_max_tokens(cfg.max_tokens)
                .with_request_timeout(Duration::from_secs(cfg.timeouts.request));
            Ok(Arc::new(client))
        }
        other => Err(LlmError::NotConfigured(format!(
            "unknown llm provider '{other}' (expected openai or mock)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_providers() {
        let mut cfg = LlmSection::default();
        cfg.provider = "mock".to_string();
        assert!(create_client_from_config(&cfg).is_ok());

        cfg.provider = "openai".to_string();
        assert!(create_client_from_config(&cfg).is_ok());

        cfg.provider = "claude-local".to_string();
        assert!(matches!(
            create_client_from_config(&cfg),
            Err(LlmError::NotConfigured(_))
        ));
    }
}
