//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 ContinueWithPlaceholder / Suppress / Disconnect / Abort。

use std::time::Duration;

use thiserror::Error;

use crate::gateway::BridgeError;
use crate::llm::LlmError;

/// 任务循环中可能出现的错误（连接断开、请求超时、取消、未知动作、决策引擎失败等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 连接已关闭：对当前会话致命，由会话层清理
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {request} (step_id {step_id}, after {after:?})")]
    RequestTimeout {
        request: String,
        step_id: u64,
        after: Duration,
    },

    /// 新指令或 STOP_AGENT 取代了当前任务
    #[error("Cancelled")]
    Cancelled,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Decision engine error: {0}")]
    DecisionEngine(#[from] LlmError),

    /// 连续多轮未选择任何动作
    #[error("Decision engine produced no action for {0} consecutive turns")]
    IdleLimit(usize),
}

impl From<BridgeError> for AgentError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout {
                request,
                step_id,
                after,
            } => AgentError::RequestTimeout {
                request,
                step_id,
                after,
            },
            BridgeError::Cancelled => AgentError::Cancelled,
            other => AgentError::Transport(other.to_string()),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 写入一条占位记录后继续循环（如观察请求超时）
    ContinueWithPlaceholder(String),
    /// 预期内的中止（取消），不作为失败上报
    Suppress,
    /// 连接已断开，无法再通知客户端
    Disconnect,
    /// 终止任务并以 agent_error 上报
    Abort,
}
