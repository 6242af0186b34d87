//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SAFARI__*` 覆盖（双下划线表示嵌套，如 `SAFARI__AGENT__MAX_STEPS=50`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::Position;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
}

/// [server] 段：WebSocket 监听地址
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    /// 未设置时使用 0.0.0.0:$PORT（PORT 缺省为 8000）
    pub bind_addr: Option<String>,
}

impl ServerSection {
    pub fn bind_addr(&self) -> String {
        if let Some(addr) = &self.bind_addr {
            return addr.clone();
        }
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);
        format!("0.0.0.0:{port}")
    }
}

/// [llm] 段：决策引擎后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai（任意 OpenAI 兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_tokens: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_llm_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_llm_request_timeout(),
        }
    }
}

fn default_llm_request_timeout() -> u64 {
    60
}

/// [agent] 段：任务循环上限、历史窗口与关联请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 单次任务最多决策轮数
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 裁剪视图保留的最近消息数
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// capture_request / move_request 等待回复的秒数
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 连续未选择动作的轮数上限
    #[serde(default = "default_max_idle_turns")]
    pub max_idle_turns: usize,
    #[serde(default)]
    pub start_position: Position,
    /// 自定义系统提示文件；未设置时使用内置提示
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_history: default_max_history(),
            request_timeout_secs: default_request_timeout_secs(),
            max_idle_turns: default_max_idle_turns(),
            start_position: Position::default(),
            system_prompt_path: None,
        }
    }
}

impl AgentSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_max_steps() -> usize {
    200
}

fn default_max_history() -> usize {
    40
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_idle_turns() -> usize {
    10
}

/// 从 config 目录加载配置，环境变量 SAFARI__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SAFARI__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SAFARI")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
