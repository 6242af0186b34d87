//! Vision Safari - WebSocket 驱动的视觉智能体服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、任务状态、任务监管
//! - **gateway**: WebSocket 服务器、请求/响应桥、连接会话与运行时
//! - **llm**: 决策引擎抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话历史与裁剪视图
//! - **observability**: 日志初始化
//! - **react**: Planner 与观察/决策/执行主循环
//! - **tools**: 动作目录与执行器

pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
