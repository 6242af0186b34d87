//! Agent Runtime（代理运行时）
//!
//! 实际的任务处理逻辑，与连接管理解耦：持有 Planner、执行器与循环上限，
//! 为每条 USER_COMMAND 构造新的 SessionState 并运行任务循环，把结束方式转为客户端通知。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::bridge::Bridge;
use super::message::ServerMessage;
use crate::config::AppConfig;
use crate::core::{AgentError, Position, RecoveryAction, RecoveryEngine, SessionState};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::{
    load_system_prompt, run_mission, LogType, MissionLimits, MissionOutcome, Planner,
};
use crate::tools::{catalog, ActionExecutor};

/// Runtime 配置
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// 系统提示词
    pub system_prompt: String,
    pub limits: MissionLimits,
    /// 裁剪视图保留的最近消息数
    pub max_history: usize,
    pub start_position: Position,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            system_prompt: crate::react::DEFAULT_SYSTEM_PROMPT.to_string(),
            limits: MissionLimits::default(),
            max_history: 40,
            start_position: Position::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self {
            system_prompt: load_system_prompt(agent.system_prompt_path.as_deref()),
            limits: MissionLimits {
                max_steps: agent.max_steps,
                max_idle_turns: agent.max_idle_turns,
                request_timeout: agent.request_timeout(),
            },
            max_history: agent.max_history,
            start_position: agent.start_position,
        }
    }
}

/// Agent Runtime：所有连接共享一份（只读）
pub struct AgentRuntime {
    config: RuntimeConfig,
    planner: Planner,
    executor: ActionExecutor,
    recovery: RecoveryEngine,
}

impl AgentRuntime {
    pub fn new(config: RuntimeConfig, llm: Arc<dyn LlmClient>) -> Self {
        let planner = Planner::new(llm, catalog(), config.max_history);
        let executor = ActionExecutor::new(config.limits.request_timeout);
        Self {
            config,
            planner,
            executor,
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// 新任务的初始状态：system 提示 + 用户指令两条框架消息
    pub fn new_state(&self, command: &str) -> SessionState {
        let mut state = SessionState::new(self.config.start_position);
        state
            .history
            .push(Message::system(self.config.system_prompt.clone()));
        state
            .history
            .push(Message::user(format!("User command: {command}")));
        state
    }

    /// 运行一个任务直到结束，并向客户端报告结束方式
    pub async fn run(&self, bridge: &Bridge, command: &str, cancel_token: CancellationToken) {
        let mut state = self.new_state(command);
        let result = run_mission(
            &self.planner,
            &self.executor,
            &self.recovery,
            bridge,
            &mut state,
            &self.config.limits,
            cancel_token,
        )
        .await;
        self.report(bridge, &state, result);
    }

    fn report(
        &self,
        bridge: &Bridge,
        state: &SessionState,
        result: Result<MissionOutcome, AgentError>,
    ) {
        let err = match result {
            Ok(MissionOutcome::Completed) => return,
            Ok(MissionOutcome::StepLimit) => {
                let notify = bridge
                    .send(&ServerMessage::log(
                        LogType::System,
                        format!(
                            "Reached the step limit ({}). Stopping.",
                            self.config.limits.max_steps
                        ),
                    ))
                    .and_then(|_| bridge.send(&ServerMessage::AgentDone));
                if let Err(e) = notify {
                    tracing::warn!("Failed to report step limit: {}", e);
                }
                return;
            }
            Err(err) => err,
        };

        match self.recovery.handle(&err) {
            RecoveryAction::Suppress => {
                tracing::info!(turns = state.turn_count, "Mission cancelled");
                // 连接可能已断开，尽力而为
                let _ = bridge
                    .send(&ServerMessage::log(
                        LogType::System,
                        "Agent loop cancelled (new command or disconnect).",
                    ))
                    .and_then(|_| bridge.send(&ServerMessage::AgentDone));
            }
            RecoveryAction::Disconnect => {
                tracing::warn!(turns = state.turn_count, "Mission ended, connection lost: {}", err);
            }
            RecoveryAction::Abort | RecoveryAction::ContinueWithPlaceholder(_) => {
                tracing::error!(turns = state.turn_count, "Mission failed: {}", err);
                if let Err(e) = bridge.send(&ServerMessage::error(format!("Agent error: {err}"))) {
                    tracing::warn!("Failed to report mission error: {}", e);
                }
            }
        }
    }
}
