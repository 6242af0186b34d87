//! 任务主循环：观察 → 决策 → 执行
//!
//! 显式状态机（ObserveView / Decide / Execute / Done）由单个任务驱动，SessionState 独占持有并逐轮传递。
//! 每个挂起点（关联请求、决策引擎调用）都与取消令牌一起 select，取消后立即返回 `AgentError::Cancelled`。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine, SessionState};
use crate::gateway::{Bridge, CaptureReply, ServerMessage};
use crate::memory::{Message, ToolCall};
use crate::react::events::LogType;
use crate::react::planner::{Decision, Planner};
use crate::tools::{ActionExecutor, ActionKind};

/// 附在观察图片上的文本
pub const OBSERVATION_PROMPT: &str = "Current 10x10 view. Analyse it and decide the next action.";

/// 客户端回复中没有图片时写入的占位
pub const MISSING_IMAGE_PLACEHOLDER: &str =
    "[CaptureView failed: no image. Decide the next action from the previous context.]";

/// 循环上限
#[derive(Debug, Clone)]
pub struct MissionLimits {
    /// 决策轮数上限（每次进入 Decide 前检查）
    pub max_steps: usize,
    /// 连续未选择动作的轮数上限；0 表示不限制
    pub max_idle_turns: usize,
    /// capture_request 等待回复的时长
    pub request_timeout: Duration,
}

impl Default for MissionLimits {
    fn default() -> Self {
        Self {
            max_steps: 200,
            max_idle_turns: 10,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// 循环的正常结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionOutcome {
    /// DeclareDone，agent_done 已发送
    Completed,
    /// 达到决策轮数上限
    StepLimit,
}

#[derive(Debug)]
enum Phase {
    ObserveView,
    Decide,
    Execute(ToolCall),
    Done,
}

/// 把 data URI 或裸 base64 统一为 `data:image/png;base64,<b64>`
pub fn normalize_image(image: &str) -> String {
    let b64 = match image.split_once(',') {
        Some((_, data)) => data,
        None => image,
    };
    format!("data:image/png;base64,{b64}")
}

/// 运行单个任务直到完成、达到上限、被取消或出错
pub async fn run_mission(
    planner: &Planner,
    executor: &ActionExecutor,
    recovery: &RecoveryEngine,
    bridge: &Bridge,
    state: &mut SessionState,
    limits: &MissionLimits,
    cancel_token: CancellationToken,
) -> Result<MissionOutcome, AgentError> {
    let mut phase = Phase::ObserveView;
    let mut idle_turns = 0usize;

    loop {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        phase = match phase {
            Phase::ObserveView => {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
                    res = observe(bridge, recovery, state, limits.request_timeout) => res?,
                }
                Phase::Decide
            }
            Phase::Decide => {
                if state.turn_count >= limits.max_steps {
                    tracing::info!(turns = state.turn_count, "Step limit reached");
                    return Ok(MissionOutcome::StepLimit);
                }
                let decision = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
                    res = planner.decide(bridge, state) => res?,
                };
                match decision {
                    Decision::Act(call) => {
                        idle_turns = 0;
                        Phase::Execute(call)
                    }
                    Decision::NoAction => {
                        idle_turns += 1;
                        if limits.max_idle_turns > 0 && idle_turns >= limits.max_idle_turns {
                            return Err(AgentError::IdleLimit(idle_turns));
                        }
                        Phase::Decide
                    }
                }
            }
            Phase::Execute(call) => {
                let executed = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
                    res = executor.execute(bridge, state, &call) => res?,
                };
                match executed.kind {
                    Some(ActionKind::DeclareDone) if state.mission_complete() => Phase::Done,
                    Some(ActionKind::SaveNote) => Phase::Decide,
                    _ => Phase::ObserveView,
                }
            }
            Phase::Done => {
                tracing::info!(
                    turns = state.turn_count,
                    found = state.found_targets.len(),
                    "Mission complete"
                );
                bridge.send(&ServerMessage::AgentDone)?;
                return Ok(MissionOutcome::Completed);
            }
        };
    }
}

/// 请求当前视野并追加为用户消息；超时或无图片时追加占位，不中止任务
async fn observe(
    bridge: &Bridge,
    recovery: &RecoveryEngine,
    state: &mut SessionState,
    timeout: Duration,
) -> Result<(), AgentError> {
    bridge.send(&ServerMessage::log(LogType::System, "Auto: CaptureView()"))?;

    match bridge.request(&ServerMessage::CaptureRequest, timeout).await {
        Ok(frame) => {
            let reply: CaptureReply = serde_json::from_value(frame).unwrap_or_else(|e| {
                tracing::warn!("Malformed capture reply: {}", e);
                CaptureReply::default()
            });
            match reply.image.filter(|img| !img.is_empty()) {
                Some(image) => state.history.push(Message::user_with_image(
                    OBSERVATION_PROMPT,
                    normalize_image(&image),
                )),
                None => {
                    bridge.send(&ServerMessage::log(
                        LogType::System,
                        "CaptureView returned no image",
                    ))?;
                    state.history.push(Message::user(MISSING_IMAGE_PLACEHOLDER));
                }
            }
            Ok(())
        }
        Err(e) => {
            let err = AgentError::from(e);
            match recovery.handle(&err) {
                RecoveryAction::ContinueWithPlaceholder(placeholder) => {
                    bridge.send(&ServerMessage::log(LogType::System, placeholder.clone()))?;
                    state.history.push(Message::user(placeholder));
                    Ok(())
                }
                _ => Err(err),
            }
        }
    }
}
