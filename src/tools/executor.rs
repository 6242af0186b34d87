//! 动作执行器
//!
//! 将决策引擎选出的动作经 Bridge 作用于游戏客户端，并据结果更新任务状态。
//! 每次执行前后各发一条 `tool` 日志；无论成功与否都向历史追加一条动作结果消息，
//! 未知动作、参数错误与移动超时转为 `{error: ...}` 结果而不中止任务。

use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::core::{AgentError, RecoveryAction, RecoveryEngine, SessionState};
use crate::gateway::{Bridge, MoveReply, ServerMessage};
use crate::memory::{Message, ToolCall};
use crate::react::LogType;
use crate::tools::action::{Action, ActionKind, MoveArgs};

/// 一次执行的结果：按动作名识别的种类（未知动作为 None）与写入历史的结果负载
#[derive(Debug, Clone)]
pub struct ExecutedAction {
    pub kind: Option<ActionKind>,
    pub result: Value,
}

/// 动作执行器：持有关联请求超时与恢复引擎
pub struct ActionExecutor {
    request_timeout: Duration,
    recovery: RecoveryEngine,
}

impl ActionExecutor {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            recovery: RecoveryEngine::new(),
        }
    }

    /// 执行单个动作调用。
    /// 仅连接断开（Transport）与取消（Cancelled）会以 Err 返回，其余失败都写成结果负载。
    pub async fn execute(
        &self,
        bridge: &Bridge,
        state: &mut SessionState,
        call: &ToolCall,
    ) -> Result<ExecutedAction, AgentError> {
        let start = Instant::now();
        // 路由跟随 last_action 记录的名字，参数错误的已知动作也保留种类
        let kind = ActionKind::from_name(&call.name);
        let result = match Action::parse(&call.name, &call.args) {
            Ok(action) => self.run(bridge, state, action).await?,
            Err(err) => {
                tracing::warn!(action = %call.name, "action rejected: {}", err);
                bridge.send(&ServerMessage::log(
                    LogType::Tool,
                    format!("Tool: {} rejected ({})", call.name, err),
                ))?;
                self.error_payload(&err)?
            }
        };

        state.last_action = Some(call.name.clone());
        state
            .history
            .push(Message::tool_result(call.id.clone(), result.to_string()));

        tracing::info!(
            action = %call.name,
            ok = result.get("error").is_none(),
            duration_ms = start.elapsed().as_millis() as u64,
            "action executed"
        );

        Ok(ExecutedAction {
            kind,
            result,
        })
    }

    async fn run(
        &self,
        bridge: &Bridge,
        state: &mut SessionState,
        action: Action,
    ) -> Result<Value, AgentError> {
        match action {
            Action::Move(args) => self.move_player(bridge, state, &args).await,
            Action::SaveNote(args) => {
                let preview: String = args.note.chars().take(80).collect();
                bridge.send(&ServerMessage::log(
                    LogType::Tool,
                    format!("Tool: SaveNote(\"{preview}\")"),
                ))?;
                state.memory_notes.push(args.note.clone());
                Ok(json!({"status": "saved", "note": args.note}))
            }
            Action::DeclareFound(args) => {
                state.found_targets.push(args.target.clone());
                let total = state.found_targets.len();
                bridge.send(&ServerMessage::log(
                    LogType::Tool,
                    format!(
                        "Tool: DeclareFound(\"{}\"), {} target(s) found so far",
                        args.target, total
                    ),
                ))?;
                Ok(json!({"status": "found", "target": args.target, "total_found": total}))
            }
            Action::DeclareDone(args) => {
                state.complete_mission();
                let found = state.found_targets.join(", ");
                let mut message = format!("Tool: DeclareDone(), mission complete! Found: [{found}]");
                if let Some(reason) = args.reason.as_deref().filter(|r| !r.is_empty()) {
                    message.push_str(&format!(" ({reason})"));
                }
                bridge.send(&ServerMessage::log(LogType::Tool, message))?;
                Ok(json!({"status": "done", "found_targets": state.found_targets}))
            }
        }
    }

    async fn move_player(
        &self,
        bridge: &Bridge,
        state: &mut SessionState,
        args: &MoveArgs,
    ) -> Result<Value, AgentError> {
        let steps = args.clamped_steps();
        bridge.send(&ServerMessage::log(
            LogType::Tool,
            format!("Tool: Move({}, {})", args.direction, steps),
        ))?;

        let request = ServerMessage::MoveRequest {
            direction: args.direction,
            steps,
        };
        let frame = match bridge.request(&request, self.request_timeout).await {
            Ok(frame) => frame,
            Err(e) => {
                let err = AgentError::from(e);
                let payload = self.error_payload(&err)?;
                bridge.send(&ServerMessage::log(
                    LogType::Tool,
                    format!("Move({}, {}) got no reply", args.direction, steps),
                ))?;
                return Ok(payload);
            }
        };

        let reply = MoveReply::from_frame(&frame);
        if reply.position().is_none() {
            tracing::warn!(reply = %frame, "move reply without a usable position");
        }
        if let Some(position) = reply.position() {
            state.position = position;
        }

        let mut log = format!(
            "Moved {}x{}/{} → {}",
            args.direction, reply.actual_steps, steps, state.position
        );
        if let Some(entity) = &reply.on_entity {
            let label = entity
                .get("emoji")
                .or_else(|| entity.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| entity.to_string());
            log.push_str(&format!(" on: {label}"));
        }
        bridge.send(&ServerMessage::log(LogType::Tool, log))?;

        let mut result = json!({
            "moved": reply.moved,
            "actual_steps": reply.actual_steps,
            "position": state.position,
        });
        if let Some(entity) = reply.on_entity {
            result["on_entity"] = entity;
        }
        Ok(result)
    }

    /// 可恢复错误转为 `{error: ...}`；取消与断开原样向上返回
    fn error_payload(&self, err: &AgentError) -> Result<Value, AgentError> {
        match self.recovery.handle(err) {
            RecoveryAction::ContinueWithPlaceholder(text) => Ok(json!({ "error": text })),
            _ => Err(match err {
                AgentError::Cancelled => AgentError::Cancelled,
                AgentError::Transport(reason) => AgentError::Transport(reason.clone()),
                other => AgentError::Transport(other.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

    use super::*;
    use crate::core::Position;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            args,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            frames.push(serde_json::from_str(&raw).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn test_save_note_issues_no_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let mut state = SessionState::new(Position::default());

        let done = executor
            .execute(&bridge, &mut state, &call("SaveNote", json!({"note": "tiger near (30,20)"})))
            .await
            .unwrap();

        assert_eq!(done.kind, Some(ActionKind::SaveNote));
        assert_eq!(done.result, json!({"status": "saved", "note": "tiger near (30,20)"}));
        assert_eq!(state.memory_notes, vec!["tiger near (30,20)".to_string()]);
        assert_eq!(state.last_action.as_deref(), Some("SaveNote"));

        let frames = drain(&mut rx);
        assert!(frames.iter().all(|f| f["type"] == "agent_log"));
        assert_eq!(bridge.pending_count().await, 0);

        let last = state.history.last().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("call_SaveNote"));
    }

    #[tokio::test]
    async fn test_declare_found_allows_duplicates() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let mut state = SessionState::default();

        for _ in 0..2 {
            executor
                .execute(&bridge, &mut state, &call("DeclareFound", json!({"target": "red tiger"})))
                .await
                .unwrap();
        }
        assert_eq!(state.found_targets.len(), 2);
        assert!(!state.mission_complete());

        let done = executor
            .execute(&bridge, &mut state, &call("DeclareDone", json!({})))
            .await
            .unwrap();
        assert!(state.mission_complete());
        assert_eq!(done.result["status"], "done");
        assert_eq!(done.result["found_targets"], json!(["red tiger", "red tiger"]));
    }

    #[tokio::test]
    async fn test_unknown_action_becomes_error_payload() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let mut state = SessionState::default();

        let done = executor
            .execute(&bridge, &mut state, &call("Fly", json!({"height": 3})))
            .await
            .unwrap();
        assert_eq!(done.kind, None);
        assert_eq!(done.result, json!({"error": "unknown action Fly"}));
        assert_eq!(state.last_action.as_deref(), Some("Fly"));
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_error_payload() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let mut state = SessionState::default();

        let done = executor
            .execute(&bridge, &mut state, &call("Move", json!({"direction": "NORTH"})))
            .await
            .unwrap();
        let error = done.result["error"].as_str().unwrap();
        assert!(error.starts_with("invalid arguments for Move"));
        assert_eq!(done.kind, Some(ActionKind::Move));
        assert_eq!(state.position, Position::default());

        let done = executor
            .execute(&bridge, &mut state, &call("SaveNote", json!({"note": 42})))
            .await
            .unwrap();
        assert!(done.result["error"].is_string());
        assert_eq!(done.kind, Some(ActionKind::SaveNote));
        assert_eq!(state.last_action.as_deref(), Some("SaveNote"));
        assert!(state.memory_notes.is_empty());
    }

    #[tokio::test]
    async fn test_move_timeout_keeps_position() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let executor = ActionExecutor::new(Duration::from_millis(20));
        let mut state = SessionState::new(Position::new(25, 25));

        let done = executor
            .execute(&bridge, &mut state, &call("Move", json!({"direction": "RIGHT", "steps": 5})))
            .await
            .unwrap();
        assert_eq!(done.kind, Some(ActionKind::Move));
        assert!(done.result["error"]
            .as_str()
            .unwrap()
            .contains("move_request failed"));
        assert_eq!(state.position, Position::new(25, 25));
        assert_eq!(bridge.pending_count().await, 0);

        let frames = drain(&mut rx);
        let request = frames
            .iter()
            .find(|f| f["type"] == "move_request")
            .unwrap();
        assert_eq!(request["direction"], "RIGHT");
        assert_eq!(request["steps"], 5);
    }

    #[tokio::test]
    async fn test_move_when_disconnected_is_transport_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let bridge = Bridge::new(tx);
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let mut state = SessionState::default();

        let err = executor
            .execute(&bridge, &mut state, &call("Move", json!({"direction": "UP"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }

    #[tokio::test]
    async fn test_move_reply_with_float_steps_updates_position() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<WsMessage>();
        let mut reader = bridge.reader(Box::pin(futures_util::stream::unfold(
            inbound_rx,
            |mut rx| async move { rx.recv().await.map(|m| (Ok::<_, WsError>(m), rx)) },
        )));
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let mut state = SessionState::new(Position::new(25, 25));

        // 游戏客户端：actual_steps 以浮点返回，其余字段正常
        let client = async move {
            while let Some(raw) = rx.recv().await {
                let frame: Value = serde_json::from_str(&raw).unwrap();
                if frame["type"] == "move_request" {
                    let reply = json!({
                        "step_id": frame["step_id"],
                        "moved": true,
                        "actual_steps": 2.0,
                        "pos": {"x": 27, "y": 25},
                        "on_animal": {"emoji": "🐯"}
                    });
                    inbound_tx.send(WsMessage::Text(reply.to_string())).unwrap();
                    drop(inbound_tx);
                    break;
                }
            }
            assert!(reader.next_message().await.is_err());
        };
        let move_call = call("Move", json!({"direction": "RIGHT", "steps": 5}));
        let (done, ()) = tokio::join!(executor.execute(&bridge, &mut state, &move_call), client);
        let done = done.unwrap();

        assert_eq!(state.position, Position::new(27, 25));
        assert_eq!(done.result["moved"], true);
        assert_eq!(done.result["actual_steps"], 2);
        assert_eq!(done.result["position"], json!({"x": 27, "y": 25}));
        assert_eq!(done.result["on_entity"]["emoji"], "🐯");
    }
}
