//! 认知层：Planner（决策步骤）、任务主循环、过程日志与内置提示

pub mod events;
pub mod loop_;
pub mod planner;
pub mod prompt;

pub use events::{preview, LogType};
pub use loop_::{normalize_image, run_mission, MissionLimits, MissionOutcome};
pub use planner::{Decision, Planner};
pub use prompt::{load_system_prompt, DEFAULT_SYSTEM_PROMPT};
