//! 网关层：游戏客户端的 WebSocket 接入
//!
//! - **Hub**：监听 `/ws/{game_id}`，按 game_id 路由连接
//! - **Bridge**：单连接上的单向通知与关联请求/响应（step_id）复用
//! - **AgentSession**：每连接一个，管理唯一的运行中任务
//! - **AgentRuntime**：任务处理逻辑（Planner + 执行器 + 主循环），所有连接共享

mod bridge;
mod hub;
mod message;
mod runtime;
mod session;

pub use bridge::{Bridge, BridgeError, BridgeReader};
pub use hub::{Hub, HubConfig, VISION_SAFARI};
pub use message::{CaptureReply, ClientCommand, MoveReply, ServerMessage};
pub use runtime::{AgentRuntime, RuntimeConfig};
pub use session::AgentSession;
