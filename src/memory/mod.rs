//! 记忆层：任务对话历史与裁剪视图

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role, ToolCall, FRAMING_TURNS};
