//! 任务状态：单次任务（mission）的可变记录
//!
//! 由该连接的任务循环独占持有，逐轮传递；任务结束、取消或断开时直接丢弃，不做持久化。

use serde::{Deserialize, Serialize};

use crate::memory::ConversationMemory;

/// 受控实体在网格上的位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 25, y: 25 }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 单次任务的状态
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// 对话历史（只追加）
    pub history: ConversationMemory,
    /// 持久笔记：不随历史裁剪丢失，每轮重新注入上下文
    pub memory_notes: Vec<String>,
    /// 已宣告找到的目标，允许重复
    pub found_targets: Vec<String>,
    pub position: Position,
    pub last_action: Option<String>,
    pub turn_count: usize,
    mission_complete: bool,
}

impl SessionState {
    pub fn new(start: Position) -> Self {
        Self {
            position: start,
            ..Self::default()
        }
    }

    pub fn mission_complete(&self) -> bool {
        self.mission_complete
    }

    /// false → true 的单向转换；仅由 DeclareDone 触发
    pub fn complete_mission(&mut self) {
        self.mission_complete = true;
    }

    /// 决策前注入的上下文块：当前位置、已找到目标、笔记。只进入视图，不写入历史
    pub fn context_block(&self) -> String {
        let mut lines = vec![format!("## Current position: {}", self.position)];

        if self.found_targets.is_empty() {
            lines.push("## Found targets: none yet".to_string());
        } else {
            lines.push(format!("## Found targets ({}):", self.found_targets.len()));
            for target in &self.found_targets {
                lines.push(format!("  ✓ {target}"));
            }
        }

        if !self.memory_notes.is_empty() {
            lines.push("## Saved notes:".to_string());
            for note in &self.memory_notes {
                lines.push(format!("  • {note}"));
            }
        }

        lines.join("\n")
    }
}
