//! 决策引擎抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：给定有序消息与动作目录，
//! 返回模型附带的文本与至多一组动作调用。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{Message, ToolCall};
use crate::tools::ActionSpec;

/// 决策引擎错误
#[derive(Error, Debug)]
pub enum LlmError {
    /// 请求失败（网络、HTTP 状态、超时）
    #[error("Request failed: {0}")]
    Request(String),

    /// 响应无法解析
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// 一次决策调用的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// 模型附带的自由文本（思考或解释）
    pub text: Option<String>,
    /// 模型选择的动作调用；调用方只取第一个
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn call(call: ToolCall) -> Self {
        Self {
            text: None,
            tool_calls: vec![call],
        }
    }
}

/// 决策引擎 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 给定消息视图与动作目录，返回文本或动作调用
    async fn complete(
        &self,
        messages: &[Message],
        actions: &[ActionSpec],
    ) -> Result<Completion, LlmError>;
}
