//! Vision Safari 服务入口
//!
//! 初始化日志、加载配置、创建决策引擎与运行时，在 `/ws/{game_id}` 上启动 WebSocket 网关，Ctrl+C 退出。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use vision_safari::config::load_config;
use vision_safari::gateway::{AgentRuntime, Hub, HubConfig, RuntimeConfig, VISION_SAFARI};
use vision_safari::llm::create_client_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vision_safari::observability::init();

    // 可选：第一个参数为额外的配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let llm = create_client_from_config(&config.llm).context("Failed to create decision engine")?;
    let runtime = Arc::new(AgentRuntime::new(RuntimeConfig::from_app_config(&config), llm));

    let hub = Hub::new(HubConfig {
        bind_addr: config.server.bind_addr(),
    })
    .with_game(VISION_SAFARI, runtime);

    let addr = hub
        .start()
        .await
        .map_err(anyhow::Error::msg)
        .context("Failed to start gateway")?;
    tracing::info!("Vision Safari server ready on {}", addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutting down");
    hub.stop();

    Ok(())
}
