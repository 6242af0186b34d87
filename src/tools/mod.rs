//! 动作层：动作目录、参数 schema 与执行器

pub mod action;
pub mod executor;
pub mod schema;

pub use action::{
    action_reminder, catalog, Action, ActionKind, ActionSpec, DeclareDoneArgs, DeclareFoundArgs,
    Direction, MoveArgs, SaveNoteArgs, MAX_MOVE_STEPS,
};
pub use executor::{ActionExecutor, ExecutedAction};
pub use schema::parameters_schema;
