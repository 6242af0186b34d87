//! 任务过程事件：agent_log 的分类与文本预览

use serde::Serialize;

/// agent_log 的 log_type，供前端分栏展示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    /// 任务生命周期（开始、观察、取消、步数上限）
    System,
    /// 注入给决策引擎的上下文块
    Memory,
    /// 决策引擎调用前的视图摘要
    Prompt,
    /// 决策引擎的选择
    Response,
    /// 决策引擎未选择动作时附带的文本
    Thinking,
    /// 动作执行前后
    Tool,
}

/// 按字符截断，超出时追加 "..."
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
