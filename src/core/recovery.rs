//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供任务循环决定是占位继续、静默结束、断开还是上报终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 根据错误类型返回建议的恢复动作
    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::RequestTimeout { request, .. } => RecoveryAction::ContinueWithPlaceholder(
                format!(
                    "[{request} failed: no reply from the game client. \
                     Decide the next action from the previous context.]"
                ),
            ),
            AgentError::UnknownAction(name) => RecoveryAction::ContinueWithPlaceholder(format!(
                "unknown action {name}"
            )),
            AgentError::InvalidArguments { name, reason } => {
                RecoveryAction::ContinueWithPlaceholder(format!(
                    "invalid arguments for {name}: {reason}"
                ))
            }
            AgentError::Cancelled => RecoveryAction::Suppress,
            AgentError::Transport(_) => RecoveryAction::Disconnect,
            AgentError::DecisionEngine(_) | AgentError::IdleLimit(_) => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_recovery_request_timeout() {
        let engine = RecoveryEngine::new();
        let err = AgentError::RequestTimeout {
            request: "capture_request".to_string(),
            step_id: 3,
            after: Duration::from_secs(30),
        };
        match engine.handle(&err) {
            RecoveryAction::ContinueWithPlaceholder(msg) => {
                assert!(msg.contains("capture_request"));
            }
            other => panic!("Expected ContinueWithPlaceholder, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_unknown_action() {
        let engine = RecoveryEngine::new();
        let err = AgentError::UnknownAction("Fly".to_string());
        assert_eq!(
            engine.handle(&err),
            RecoveryAction::ContinueWithPlaceholder("unknown action Fly".to_string())
        );
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::new();
        assert_eq!(engine.handle(&AgentError::Cancelled), RecoveryAction::Suppress);
    }

    #[test]
    fn test_recovery_transport() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Transport("connection closed".to_string());
        assert_eq!(engine.handle(&err), RecoveryAction::Disconnect);
    }

    #[test]
    fn test_recovery_llm_error() {
        let engine = RecoveryEngine::new();
        let err = AgentError::DecisionEngine(LlmError::Request("503".to_string()));
        assert_eq!(engine.handle(&err), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_idle_limit() {
        let engine = RecoveryEngine::new();
        assert_eq!(engine.handle(&AgentError::IdleLimit(10)), RecoveryAction::Abort);
    }

    #[test]
    fn test_bridge_error_conversion() {
        use crate::gateway::BridgeError;

        assert!(matches!(
            AgentError::from(BridgeError::Cancelled),
            AgentError::Cancelled
        ));
        assert!(matches!(
            AgentError::from(BridgeError::Disconnected),
            AgentError::Transport(_)
        ));
        let timeout = BridgeError::Timeout {
            request: "move_request".to_string(),
            step_id: 7,
            after: Duration::from_millis(50),
        };
        assert!(matches!(
            AgentError::from(timeout),
            AgentError::RequestTimeout { step_id: 7, .. }
        ));
    }
}
