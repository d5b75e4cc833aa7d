use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name of the built-in method that runs a shell command template.
pub const SHELL_METHOD: &str = "shell";

/// The unit of work a run executes: a registered method name plus the state
/// it is called with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub name: String,
    #[serde(default)]
    pub state: Value,
}

impl MethodCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Value::Null,
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Call the built-in shell method with a command template such as
    /// `python train.py --seed {seed}`.
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new(SHELL_METHOD).with_state(json!({ "command": command.into() }))
    }
}
