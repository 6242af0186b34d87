//! WebSocket 请求/响应桥
//!
//! 同一条有序消息流上承载两类流量：
//! - `send`：单向通知（agent_log 等），不等待回复
//! - `request`：注入递增的 `step_id` 后发送，挂起直到客户端回传相同 `step_id` 的帧、超时或被 reset
//!
//! `BridgeReader` 读取所有入站帧：命中挂起请求的回复在内部完成，不会出现在应用消息中；
//! 其余帧按到达顺序返回给连接主循环。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// 桥层错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Connection closed")]
    Disconnected,

    #[error("No reply to {request} (step_id {step_id}) within {after:?}")]
    Timeout {
        request: String,
        step_id: u64,
        after: Duration,
    },

    /// 挂起的请求被 reset / clear 取消
    #[error("Request cancelled")]
    Cancelled,

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Request frame must be a JSON object")]
    InvalidRequest,
}

/// 关联状态：计数器、代数与挂起表，只由本桥实例修改
#[derive(Default)]
struct Correlation {
    counter: u64,
    /// 每次 clear / reset 递增；超时清理只作用于同一代的句柄
    generation: u64,
    pending: HashMap<u64, oneshot::Sender<Value>>,
}

struct BridgeInner {
    outbound: mpsc::UnboundedSender<String>,
    correlation: Mutex<Correlation>,
}

/// 单个连接的桥；克隆后共享同一挂起表与出站通道
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// outbound 由连接的写任务消费（每条为一帧 JSON 文本）
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                outbound,
                correlation: Mutex::new(Correlation::default()),
            }),
        }
    }

    /// 单向发送；连接已关闭时返回 Disconnected
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), BridgeError> {
        let text = serde_json::to_string(message)?;
        self.send_text(text)
    }

    fn send_text(&self, text: String) -> Result<(), BridgeError> {
        self.inner
            .outbound
            .send(text)
            .map_err(|_| BridgeError::Disconnected)
    }

    /// 发送并等待关联回复，返回完整回复帧
    pub async fn request<T: Serialize + ?Sized>(
        &self,
        message: &T,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        let mut frame = serde_json::to_value(message)?;
        let request = frame
            .get("type")
            .or_else(|| frame.get("event"))
            .and_then(Value::as_str)
            .unwrap_or("request")
            .to_string();
        let fields = frame.as_object_mut().ok_or(BridgeError::InvalidRequest)?;

        let (tx, rx) = oneshot::channel();
        let (step_id, generation) = {
            let mut correlation = self.inner.correlation.lock().await;
            correlation.counter += 1;
            let step_id = correlation.counter;
            correlation.pending.insert(step_id, tx);
            (step_id, correlation.generation)
        };
        fields.insert("step_id".to_string(), Value::from(step_id));

        if let Err(e) = self.send_text(frame.to_string()) {
            self.forget(step_id, generation).await;
            return Err(e);
        }
        tracing::debug!(step_id, request = %request, "bridge request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BridgeError::Cancelled),
            Err(_) => {
                self.forget(step_id, generation).await;
                tracing::warn!(step_id, request = %request, "bridge request timed out");
                Err(BridgeError::Timeout {
                    request,
                    step_id,
                    after: timeout,
                })
            }
        }
    }

    async fn forget(&self, step_id: u64, generation: u64) {
        let mut correlation = self.inner.correlation.lock().await;
        if correlation.generation == generation {
            correlation.pending.remove(&step_id);
        }
    }

    /// 若帧命中挂起请求则完成之并返回 None，否则原样返回
    async fn resolve(&self, frame: Value) -> Option<Value> {
        if let Some(step_id) = frame.get("step_id").and_then(Value::as_u64) {
            let sender = self.inner.correlation.lock().await.pending.remove(&step_id);
            if let Some(tx) = sender {
                tracing::debug!(step_id, "bridge reply resolved");
                let _ = tx.send(frame);
                return None;
            }
        }
        Some(frame)
    }

    /// 取消全部挂起请求（等待方得到 Cancelled）
    pub async fn clear(&self) {
        let mut correlation = self.inner.correlation.lock().await;
        correlation.generation += 1;
        correlation.pending.clear();
    }

    /// 取消全部挂起请求并将 step_id 计数器归零
    pub async fn reset(&self) {
        let mut correlation = self.inner.correlation.lock().await;
        correlation.generation += 1;
        correlation.pending.clear();
        correlation.counter = 0;
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.correlation.lock().await.pending.len()
    }

    /// 绑定入站流，得到应用消息读取器
    pub fn reader<S>(&self, stream: S) -> BridgeReader<S> {
        BridgeReader {
            bridge: self.clone(),
            stream,
        }
    }
}

/// 入站帧读取器：吞掉已匹配的回复，只返回应用消息
pub struct BridgeReader<S> {
    bridge: Bridge,
    stream: S,
}

impl<S> BridgeReader<S>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    /// 下一条应用消息；连接关闭时返回 Disconnected
    pub async fn next_message(&mut self) -> Result<Value, BridgeError> {
        while let Some(item) = self.stream.next().await {
            let text = match item {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) => return Err(BridgeError::Disconnected),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("WebSocket receive error: {}", e);
                    return Err(BridgeError::Disconnected);
                }
            };
            let frame: Value = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Dropping non-JSON frame: {}", e);
                    continue;
                }
            };
            if let Some(message) = self.bridge.resolve(frame).await {
                return Ok(message);
            }
        }
        Err(BridgeError::Disconnected)
    }
}
