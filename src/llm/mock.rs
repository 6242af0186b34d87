//! Mock 决策引擎（用于测试与离线演示，无需 API）
//!
//! 按脚本依次返回预设结果；脚本耗尽后返回 DeclareDone，保证任务能够结束。
//! 每次调用收到的消息视图都会被记录，便于断言裁剪与上下文注入。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{Completion, LlmClient, LlmError};
use crate::memory::{Message, ToolCall};
use crate::tools::ActionSpec;

/// 脚本化 Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<Completion, String>>>,
    views: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定结果序列构造
    pub fn scripted(steps: impl IntoIterator<Item = Completion>) -> Self {
        let mock = Self::new();
        for step in steps {
            mock.push(step);
        }
        mock
    }

    pub fn push(&self, completion: Completion) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(completion));
        }
    }

    /// 下一次调用返回 LlmError::Request
    pub fn push_error(&self, message: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.into()));
        }
    }

    /// 构造一个动作调用结果（id 自动生成）
    pub fn action(name: &str, args: Value) -> Completion {
        Completion::call(ToolCall {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            args,
        })
    }

    /// 已收到的全部消息视图
    pub fn views(&self) -> Vec<Vec<Message>> {
        self.views.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.views.lock().map(|v| v.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _actions: &[ActionSpec],
    ) -> Result<Completion, LlmError> {
        if let Ok(mut views) = self.views.lock() {
            views.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(LlmError::Request(message)),
            None => Ok(Self::action(
                "DeclareDone",
                json!({"reason": "mock script exhausted"}),
            )),
        }
    }
}
