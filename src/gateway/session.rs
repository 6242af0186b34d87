//! 会话管理
//!
//! 每个连接一个 AgentSession：按到达顺序处理客户端指令，持有唯一的运行中任务。
//! 新指令或 STOP_AGENT 先取消并等待旧任务退出，再重置 Bridge 的关联状态，保证新任务的 step_id 从 1 开始。

use std::sync::Arc;

use serde_json::Value;

use super::bridge::{Bridge, BridgeError};
use super::message::{ClientCommand, ServerMessage};
use super::runtime::AgentRuntime;
use crate::core::MissionSupervisor;
use crate::react::LogType;

/// 单个连接的会话
pub struct AgentSession {
    bridge: Bridge,
    runtime: Arc<AgentRuntime>,
    supervisor: MissionSupervisor,
}

impl AgentSession {
    pub fn new(bridge: Bridge, runtime: Arc<AgentRuntime>) -> Self {
        Self {
            bridge,
            runtime,
            supervisor: MissionSupervisor::new(),
        }
    }

    /// 处理一条应用消息；无法识别的消息忽略。仅在连接已关闭时返回错误
    pub async fn dispatch(&mut self, frame: Value) -> Result<(), BridgeError> {
        let command: ClientCommand = match serde_json::from_value(frame) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("Ignoring unrecognized message: {}", e);
                return Ok(());
            }
        };

        match command {
            ClientCommand::UserCommand { payload } => self.start_mission(payload).await,
            ClientCommand::StopAgent => self.stop_mission().await,
        }
    }

    async fn start_mission(&mut self, payload: String) -> Result<(), BridgeError> {
        self.supervisor.cancel_and_wait().await;
        self.bridge.reset().await;

        self.bridge.send(&ServerMessage::log(
            LogType::System,
            format!("Agent loop started: \"{payload}\""),
        ))?;
        tracing::info!(command = %payload, "Mission started");

        let bridge = self.bridge.clone();
        let runtime = Arc::clone(&self.runtime);
        self.supervisor.start(move |cancel_token| async move {
            runtime.run(&bridge, &payload, cancel_token).await;
        });
        Ok(())
    }

    async fn stop_mission(&mut self) -> Result<(), BridgeError> {
        self.supervisor.cancel_and_wait().await;
        self.bridge.reset().await;
        tracing::info!("Mission stopped by user");

        self.bridge
            .send(&ServerMessage::log(LogType::System, "User stopped the agent."))?;
        self.bridge.send(&ServerMessage::AgentDone)
    }

    /// 连接关闭：取消任务并清空挂起请求
    pub async fn shutdown(&mut self) {
        self.supervisor.cancel_and_wait().await;
        self.bridge.clear().await;
    }
}
