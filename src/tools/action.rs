//! 动作目录：决策引擎每轮只能调用其中一个
//!
//! 闭合的 Action 枚举，每个变体携带强类型参数；按名称解析，未知名称或参数类型错误返回 AgentError，
//! 由执行器转换为错误结果而不中止任务。

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::schema::parameters_schema;

/// 单次移动允许的最大格数
pub const MAX_MOVE_STEPS: i64 = 10;

/// 移动方向
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
            Direction::Left => write!(f, "LEFT"),
            Direction::Right => write!(f, "RIGHT"),
        }
    }
}

fn default_steps() -> i64 {
    1
}

/// 部分模型会把整数写成 3.0
fn lenient_steps<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i64)
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct MoveArgs {
    /// Direction to move: UP, DOWN, LEFT or RIGHT.
    #[serde(default)]
    pub direction: Direction,
    /// Number of cells to move (1-10).
    #[serde(default = "default_steps", deserialize_with = "lenient_steps")]
    #[schemars(with = "i64", range(min = 1, max = 10))]
    pub steps: i64,
}

impl MoveArgs {
    /// 限制在 1..=10
    pub fn clamped_steps(&self) -> u8 {
        self.steps.clamp(1, MAX_MOVE_STEPS) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct SaveNoteArgs {
    /// Observation to keep in permanent memory (sightings with estimated coordinates, obstacles, plans).
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct DeclareFoundArgs {
    /// The target that was reached, e.g. "red tiger".
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, JsonSchema)]
pub struct DeclareDoneArgs {
    /// Optional short reason for ending the mission.
    #[serde(default)]
    pub reason: Option<String>,
}

/// 动作种类（用于循环路由）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move,
    SaveNote,
    DeclareFound,
    DeclareDone,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Move,
        ActionKind::SaveNote,
        ActionKind::DeclareFound,
        ActionKind::DeclareDone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Move => "Move",
            ActionKind::SaveNote => "SaveNote",
            ActionKind::DeclareFound => "DeclareFound",
            ActionKind::DeclareDone => "DeclareDone",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ActionKind::Move => {
                "Move the player N cells (1-10) in one direction. Returns the new position, \
                 the number of cells actually moved, and whether the player landed on an animal."
            }
            ActionKind::SaveNote => {
                "Save an observation to permanent memory (kept even when history is trimmed). \
                 Use it for animal sightings with estimated coordinates, obstacles and search plans."
            }
            ActionKind::DeclareFound => {
                "Declare that a specific target was found and reached. Call it when standing on \
                 the target animal. The mission continues for the remaining targets."
            }
            ActionKind::DeclareDone => {
                "Declare the whole mission complete. Only call it after every target was \
                 declared with DeclareFound."
            }
        }
    }

    fn parameters(self) -> Value {
        match self {
            ActionKind::Move => parameters_schema::<MoveArgs>(),
            ActionKind::SaveNote => parameters_schema::<SaveNoteArgs>(),
            ActionKind::DeclareFound => parameters_schema::<DeclareFoundArgs>(),
            ActionKind::DeclareDone => parameters_schema::<DeclareDoneArgs>(),
        }
    }
}

/// 解析后的动作
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move(MoveArgs),
    SaveNote(SaveNoteArgs),
    DeclareFound(DeclareFoundArgs),
    DeclareDone(DeclareDoneArgs),
}

impl Action {
    /// 按名称与 JSON 参数解析；args 为 null 时视为空对象
    pub fn parse(name: &str, args: &Value) -> Result<Self, AgentError> {
        let kind =
            ActionKind::from_name(name).ok_or_else(|| AgentError::UnknownAction(name.to_string()))?;
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args.clone()
        };
        let invalid = |e: serde_json::Error| AgentError::InvalidArguments {
            name: name.to_string(),
            reason: e.to_string(),
        };
        Ok(match kind {
            ActionKind::Move => Action::Move(serde_json::from_value(args).map_err(invalid)?),
            ActionKind::SaveNote => Action::SaveNote(serde_json::from_value(args).map_err(invalid)?),
            ActionKind::DeclareFound => {
                Action::DeclareFound(serde_json::from_value(args).map_err(invalid)?)
            }
            ActionKind::DeclareDone => {
                Action::DeclareDone(serde_json::from_value(args).map_err(invalid)?)
            }
        })
    }
}

/// 交给决策引擎的动作描述：名称、说明与参数 schema
#[derive(Debug, Clone, Serialize)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// 完整动作目录
pub fn catalog() -> Vec<ActionSpec> {
    ActionKind::ALL
        .into_iter()
        .map(|kind| ActionSpec {
            name: kind.name(),
            description: kind.description(),
            parameters: kind.parameters(),
        })
        .collect()
}

/// 提示模型必须调用动作的追加消息
pub fn action_reminder() -> String {
    let names: Vec<&str> = ActionKind::ALL.iter().map(|k| k.name()).collect();
    format!("Call exactly one of {} to continue.", names.join(", "))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_move_with_defaults_and_clamp() {
        let action = Action::parse("Move", &json!({"direction": "RIGHT", "steps": 25})).unwrap();
        match action {
            Action::Move(args) => {
                assert_eq!(args.direction, Direction::Right);
                assert_eq!(args.clamped_steps(), 10);
            }
            other => panic!("Expected Move, got {other:?}"),
        }

        let action = Action::parse("Move", &json!({})).unwrap();
        assert_eq!(
            action,
            Action::Move(MoveArgs {
                direction: Direction::Up,
                steps: 1
            })
        );

        let action = Action::parse("Move", &json!({"direction": "LEFT", "steps": 0})).unwrap();
        match action {
            Action::Move(args) => assert_eq!(args.clamped_steps(), 1),
            other => panic!("Expected Move, got {other:?}"),
        }

        let action = Action::parse("Move", &json!({"direction": "DOWN", "steps": 3.0})).unwrap();
        assert_eq!(
            action,
            Action::Move(MoveArgs {
                direction: Direction::Down,
                steps: 3
            })
        );
    }

    #[test]
    fn test_parse_declare_done_without_args() {
        let action = Action::parse("DeclareDone", &Value::Null).unwrap();
        assert_eq!(action, Action::DeclareDone(DeclareDoneArgs { reason: None }));
    }

    #[test]
    fn test_parse_unknown_and_invalid() {
        assert!(matches!(
            Action::parse("Fly", &json!({})),
            Err(AgentError::UnknownAction(name)) if name == "Fly"
        ));
        assert!(matches!(
            Action::parse("Move", &json!({"direction": "SIDEWAYS"})),
            Err(AgentError::InvalidArguments { .. })
        ));
        assert!(matches!(
            Action::parse("SaveNote", &json!({"note": 42})),
            Err(AgentError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_catalog_schemas() {
        let specs = catalog();
        let names: Vec<&str> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Move", "SaveNote", "DeclareFound", "DeclareDone"]);

        let move_schema = &specs[0].parameters;
        assert_eq!(move_schema["type"], "object");
        assert!(move_schema.get("$schema").is_none());
        let direction = &move_schema["properties"]["direction"];
        let variants = direction["enum"].as_array().unwrap();
        assert!(variants.contains(&json!("RIGHT")));

        let note_schema = &specs[1].parameters;
        assert_eq!(note_schema["properties"]["note"]["type"], "string");
    }

    #[test]
    fn test_action_reminder_names_every_action() {
        let reminder = action_reminder();
        for kind in ActionKind::ALL {
            assert!(reminder.contains(kind.name()));
        }
    }
}
