//! 游戏客户端消息协议定义
//!
//! 入站指令以 `event` 字段区分，出站通知与关联请求以 `type` 字段区分；
//! 关联请求的 `step_id` 由 Bridge 注入，不出现在这里的类型中。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Position;
use crate::react::LogType;
use crate::tools::Direction;

/// 客户端发来的连接级指令
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum ClientCommand {
    /// 开始新任务（取代正在运行的任务）
    #[serde(rename = "USER_COMMAND")]
    UserCommand {
        #[serde(default)]
        payload: String,
    },
    /// 停止当前任务
    #[serde(rename = "STOP_AGENT")]
    StopAgent,
}

/// 服务端发往客户端的消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 任务过程日志
    AgentLog {
        log_type: LogType,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// 任务结束（完成、取消、达到步数上限）
    AgentDone,
    /// 任务异常终止
    AgentError { message: String },
    /// 请求当前视野截图（关联请求）
    CaptureRequest,
    /// 请求移动（关联请求）
    MoveRequest { direction: Direction, steps: u8 },
}

impl ServerMessage {
    pub fn log(log_type: LogType, message: impl Into<String>) -> Self {
        Self::AgentLog {
            log_type,
            message: message.into(),
            detail: None,
        }
    }

    pub fn log_with_detail(
        log_type: LogType,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self::AgentLog {
            log_type,
            message: message.into(),
            detail: detail.filter(|d| !d.is_empty()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::AgentError {
            message: message.into(),
        }
    }
}

/// capture_request 的回复；失败时客户端省略 image 或置为 null
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureReply {
    #[serde(default)]
    pub image: Option<String>,
}

/// move_request 的回复。逐字段宽松解析：某个字段格式异常时只丢弃该字段，
/// 其余字段（尤其是 pos）照常使用
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveReply {
    pub moved: bool,
    pub actual_steps: u32,
    /// 原始位置字段；格式不完整时不覆盖任务状态中的位置
    pub pos: Option<Value>,
    /// 落点上的兴趣点描述（旧客户端使用 on_animal）
    pub on_entity: Option<Value>,
}

impl MoveReply {
    pub fn from_frame(frame: &Value) -> Self {
        let actual_steps = frame
            .get("actual_steps")
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round() as u32)
            .unwrap_or_default();
        let on_entity = ["on_entity", "on_animal"]
            .iter()
            .filter_map(|key| frame.get(*key))
            .find(|v| !v.is_null())
            .cloned();
        Self {
            moved: frame.get("moved").and_then(Value::as_bool).unwrap_or_default(),
            actual_steps,
            pos: frame.get("pos").filter(|v| !v.is_null()).cloned(),
            on_entity,
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.pos
            .clone()
            .and_then(|pos| serde_json::from_value(pos).ok())
    }
}
