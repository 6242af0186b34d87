//! 集成测试公共设施：用通道模拟游戏客户端

#![allow(dead_code)]

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use vision_safari::gateway::Bridge;

pub type Inbound = Pin<Box<dyn Stream<Item = Result<WsMessage, WsError>> + Send>>;

pub fn inbound(rx: mpsc::UnboundedReceiver<WsMessage>) -> Inbound {
    Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|m| (Ok(m), rx))
    }))
}

/// 模拟的游戏客户端行为
pub struct FakeGame {
    /// capture_request 回复的图片；None 表示回复 `image: null`
    pub image: Option<String>,
    /// 预设的 move_request 回复（不含 step_id）；耗尽后按方向与步数自行计算
    pub move_replies: VecDeque<Value>,
    /// false 时不回复任何关联请求
    pub respond: bool,
}

impl Default for FakeGame {
    fn default() -> Self {
        Self {
            image: Some("iVBORw0KGgo=".to_string()),
            move_replies: VecDeque::new(),
            respond: true,
        }
    }
}

pub struct Connected {
    pub bridge: Bridge,
    /// 客户端收到的全部帧；遇到 agent_done / agent_error 后结束
    pub game: JoinHandle<Vec<Value>>,
}

/// 建立一个由 FakeGame 应答的 Bridge
pub fn connect(mut game: FakeGame) -> Connected {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<WsMessage>();
    let bridge = Bridge::new(out_tx);
    let mut reader = bridge.reader(inbound(in_rx));

    tokio::spawn(async move { while reader.next_message().await.is_ok() {} });

    let game = tokio::spawn(async move {
        let mut frames = Vec::new();
        let (mut x, mut y) = (25i64, 25i64);
        while let Some(raw) = out_rx.recv().await {
            let frame: Value = serde_json::from_str(&raw).unwrap();
            let kind = frame["type"].as_str().unwrap_or_default().to_string();
            let step_id = frame["step_id"].clone();

            if game.respond {
                let reply = match kind.as_str() {
                    "capture_request" => Some(json!({ "step_id": step_id, "image": game.image })),
                    "move_request" => {
                        let mut reply = game.move_replies.pop_front().unwrap_or_else(|| {
                            let steps = frame["steps"].as_i64().unwrap_or(1);
                            match frame["direction"].as_str() {
                                Some("UP") => y -= steps,
                                Some("DOWN") => y += steps,
                                Some("LEFT") => x -= steps,
                                _ => x += steps,
                            }
                            json!({"moved": true, "actual_steps": steps, "pos": {"x": x, "y": y}})
                        });
                        if let Some(pos) = reply.get("pos") {
                            x = pos["x"].as_i64().unwrap_or(x);
                            y = pos["y"].as_i64().unwrap_or(y);
                        }
                        reply["step_id"] = step_id;
                        Some(reply)
                    }
                    _ => None,
                };
                if let Some(reply) = reply {
                    let _ = in_tx.send(WsMessage::Text(reply.to_string()));
                }
            }

            frames.push(frame);
            if kind == "agent_done" || kind == "agent_error" {
                break;
            }
        }
        frames
    });

    Connected { bridge, game }
}

pub fn of_type<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
    frames.iter().filter(|f| f["type"] == kind).collect()
}

pub fn log_messages(frames: &[Value]) -> Vec<String> {
    of_type(frames, "agent_log")
        .into_iter()
        .filter_map(|f| f["message"].as_str().map(str::to_string))
        .collect()
}
