//! 短期记忆：对话历史
//!
//! 历史只追加不删除；每轮决策前通过 `window` 构造裁剪视图：保留开头的框架消息（system + 用户指令）
//! 与最近 N 条消息，供决策引擎使用。

use serde::{Deserialize, Serialize};

/// 裁剪视图中始终保留的开头消息数（system 提示 + 用户指令）
pub const FRAMING_TURNS: usize = 2;

/// 消息角色（与 LLM API 一致，Tool 为动作执行结果）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// 决策引擎返回的单个动作调用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// 单条消息；image 为 data URI（多模态观察），tool_call / tool_call_id 用于动作调用与结果配对
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image: None,
            tool_call: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// 文本 + 内联图片的用户消息
    pub fn user_with_image(content: impl Into<String>, image_data_uri: impl Into<String>) -> Self {
        Self {
            image: Some(image_data_uri.into()),
            ..Self::plain(Role::User, content)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// 带动作调用的助手消息（content 为模型附带的文本，可为空）
    pub fn assistant_with_call(content: impl Into<String>, call: ToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// 动作执行结果（content 为 JSON 文本）
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    /// 日志用单行摘要：图片显示为 [image]，动作调用显示为 → name(args)
    pub fn summarize(&self) -> String {
        let role = match self.role {
            Role::User => "User",
            Role::Assistant => "AI",
            Role::System => "System",
            Role::Tool => "Tool",
        };
        let text = if let Some(call) = &self.tool_call {
            let args: String = call.args.to_string().chars().take(80).collect();
            format!("→ {}({})", call.name, args)
        } else if self.image.is_some() {
            let text: String = self.content.chars().take(100).collect();
            format!("{text} [image]")
        } else {
            self.content.chars().take(200).collect()
        };
        format!("[{role}] {text}")
    }
}

/// 任务对话历史：只追加；裁剪只作用于 `window` 返回的视图
#[derive(Clone, Debug, Default)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 构造裁剪视图：总数超过 FRAMING_TURNS + max_recent 时，取开头 FRAMING_TURNS 条与最近 max_recent 条。
    /// 返回 (视图, 是否发生裁剪)
    pub fn window(&self, max_recent: usize) -> (Vec<Message>, bool) {
        if self.messages.len() <= FRAMING_TURNS + max_recent {
            return (self.messages.clone(), false);
        }
        let tail_start = self.messages.len() - max_recent;
        let view = self.messages[..FRAMING_TURNS]
            .iter()
            .chain(self.messages[tail_start..].iter())
            .cloned()
            .collect();
        (view, true)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
