//! Planner：决策步骤
//!
//! 将任务状态渲染为裁剪后的消息视图（框架消息 + 最近 N 条 + 上下文块），调用决策引擎，
//! 并把结果解释为「调用一个动作」或「未选择动作」。上下文块只进入视图，不写入历史。

use std::sync::Arc;

use crate::core::{AgentError, SessionState};
use crate::gateway::{Bridge, ServerMessage};
use crate::llm::LlmClient;
use crate::memory::{Message, ToolCall};
use crate::react::events::{preview, LogType};
use crate::tools::{action_reminder, ActionSpec};

const THINKING_PREVIEW_CHARS: usize = 200;
const ARGS_PREVIEW_CHARS: usize = 80;

/// 单轮决策结果
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 决策引擎选择了一个动作
    Act(ToolCall),
    /// 只返回了文本；历史中已追加催促消息
    NoAction,
}

/// Planner：持有决策引擎、动作目录与历史窗口大小
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    actions: Vec<ActionSpec>,
    max_history: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, actions: Vec<ActionSpec>, max_history: usize) -> Self {
        Self {
            llm,
            actions,
            max_history,
        }
    }

    /// 构造交给决策引擎的视图：上下文块插在 system 提示（index 0）之后
    pub fn build_view(&self, state: &SessionState) -> (Vec<Message>, bool) {
        let (window, trimmed) = state.history.window(self.max_history);
        let context = Message::system(state.context_block());
        let mut view = Vec::with_capacity(window.len() + 1);
        let mut rest = window.into_iter();
        if let Some(first) = rest.next() {
            view.push(first);
        }
        view.push(context);
        view.extend(rest);
        (view, trimmed)
    }

    /// 执行一轮决策；turn_count 在调用决策引擎前 +1（无论是否选出动作）
    pub async fn decide(
        &self,
        bridge: &Bridge,
        state: &mut SessionState,
    ) -> Result<Decision, AgentError> {
        state.turn_count += 1;
        let turn = state.turn_count;

        bridge.send(&ServerMessage::log_with_detail(
            LogType::Memory,
            format!(
                "[Turn {}] Memory: position {}, {} target(s) found, {} note(s)",
                turn,
                state.position,
                state.found_targets.len(),
                state.memory_notes.len()
            ),
            Some(state.context_block()),
        ))?;

        let (view, trimmed) = self.build_view(state);
        let summary: Vec<String> = view.iter().map(Message::summarize).collect();
        bridge.send(&ServerMessage::log_with_detail(
            LogType::Prompt,
            format!(
                "[Turn {}] Calling decision engine ({} messages{})",
                turn,
                view.len(),
                if trimmed { ", trimmed" } else { "" }
            ),
            Some(summary.join("\n")),
        ))?;

        let completion = self.llm.complete(&view, &self.actions).await?;
        let text = completion.text.unwrap_or_default();

        match completion.tool_calls.into_iter().next() {
            Some(call) => {
                let args = call.args.to_string();
                let mut detail = format!("Action: {}\nArgs: {}", call.name, args);
                if !text.is_empty() {
                    detail.push_str(&format!("\n\nRaw response:\n{text}"));
                }
                bridge.send(&ServerMessage::log_with_detail(
                    LogType::Response,
                    format!(
                        "[Turn {}] Response → {}({})",
                        turn,
                        call.name,
                        preview(&args, ARGS_PREVIEW_CHARS)
                    ),
                    Some(detail),
                ))?;
                tracing::debug!(turn, action = %call.name, "decision engine chose an action");
                state
                    .history
                    .push(Message::assistant_with_call(text, call.clone()));
                Ok(Decision::Act(call))
            }
            None => {
                bridge.send(&ServerMessage::log_with_detail(
                    LogType::Response,
                    format!("[Turn {turn}] Response (no action)"),
                    Some(text.clone()),
                ))?;
                if !text.is_empty() {
                    let long = text.chars().count() > THINKING_PREVIEW_CHARS;
                    bridge.send(&ServerMessage::log_with_detail(
                        LogType::Thinking,
                        format!("Thinking: {}", preview(&text, THINKING_PREVIEW_CHARS)),
                        long.then(|| text.clone()),
                    ))?;
                    state.history.push(Message::assistant(text));
                }
                tracing::debug!(turn, "decision engine chose no action");
                state.history.push(Message::user(action_reminder()));
                Ok(Decision::NoAction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::core::Position;
    use crate::llm::{Completion, MockLlmClient};
    use crate::memory::Role;
    use crate::tools::catalog;

    fn framed_state() -> SessionState {
        let mut state = SessionState::new(Position::default());
        state.history.push(Message::system("prompt"));
        state.history.push(Message::user("User command: find the tiger"));
        state
    }

    #[test]
    fn test_view_inserts_context_after_system() {
        let planner = Planner::new(Arc::new(MockLlmClient::new()), catalog(), 40);
        let mut state = framed_state();
        state.memory_notes.push("tiger near (30, 20)".to_string());

        let (view, trimmed) = planner.build_view(&state);
        assert!(!trimmed);
        assert_eq!(view.len(), 3);
        assert_eq!(view[0].content, "prompt");
        assert_eq!(view[1].role, Role::System);
        assert!(view[1].content.contains("tiger near (30, 20)"));
        assert_eq!(view[2].content, "User command: find the tiger");
        // 上下文块不写入历史
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn test_view_trims_but_keeps_framing_and_notes() {
        let planner = Planner::new(Arc::new(MockLlmClient::new()), catalog(), 4);
        let mut state = framed_state();
        for i in 0..10 {
            state.history.push(Message::user(format!("turn {i}")));
        }
        state.found_targets.push("red tiger".to_string());

        let (view, trimmed) = planner.build_view(&state);
        assert!(trimmed);
        assert_eq!(view.len(), 2 + 1 + 4);
        assert_eq!(view[2].content, "User command: find the tiger");
        assert!(view[1].content.contains("✓ red tiger"));
        assert_eq!(view.last().unwrap().content, "turn 9");
        assert_eq!(view[3].content, "turn 6");
    }

    #[tokio::test]
    async fn test_decide_with_action() {
        let mock = Arc::new(MockLlmClient::scripted([MockLlmClient::action(
            "Move",
            json!({"direction": "RIGHT", "steps": 5}),
        )]));
        let planner = Planner::new(mock.clone(), catalog(), 40);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let mut state = framed_state();

        let decision = planner.decide(&bridge, &mut state).await.unwrap();
        match decision {
            Decision::Act(call) => assert_eq!(call.name, "Move"),
            other => panic!("Expected Act, got {other:?}"),
        }
        assert_eq!(state.turn_count, 1);
        assert!(state.history.last().unwrap().tool_call.is_some());

        let mut kinds = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let frame: serde_json::Value = serde_json::from_str(&raw).unwrap();
            kinds.push(frame["log_type"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds, vec!["memory", "prompt", "response"]);
    }

    #[tokio::test]
    async fn test_decide_without_action_appends_reminder() {
        let mock = Arc::new(MockLlmClient::scripted([
            Completion::text("Let me think about where the tiger is."),
            Completion::default(),
        ]));
        let planner = Planner::new(mock, catalog(), 40);
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let mut state = framed_state();

        assert_eq!(
            planner.decide(&bridge, &mut state).await.unwrap(),
            Decision::NoAction
        );
        assert_eq!(state.turn_count, 1);
        assert_eq!(state.history.len(), 4);
        assert_eq!(state.history.messages()[2].role, Role::Assistant);
        assert_eq!(state.history.last().unwrap().content, action_reminder());

        // 空文本：只追加催促消息
        assert_eq!(
            planner.decide(&bridge, &mut state).await.unwrap(),
            Decision::NoAction
        );
        assert_eq!(state.turn_count, 2);
        assert_eq!(state.history.len(), 5);
    }

    #[tokio::test]
    async fn test_decide_engine_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error("upstream 500");
        let planner = Planner::new(mock, catalog(), 40);
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(tx);
        let mut state = framed_state();

        let err = planner.decide(&bridge, &mut state).await.unwrap_err();
        assert!(matches!(err, AgentError::DecisionEngine(_)));
    }
}
