//! 核心层：错误与恢复、任务状态、任务监管

pub mod error;
pub mod recovery;
pub mod session_supervisor;
pub mod state;

pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use session_supervisor::MissionSupervisor;
pub use state::{Position, SessionState};
