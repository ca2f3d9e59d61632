use crate::error::{ModelError, ModelResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INVESTIGATE_TOOL: &str = "investigate";
pub const FINISH_TOOL: &str = "finish";

/// Arguments of the `investigate` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InvestigateArgs {
    /// A single read-only shell pipeline run from the workspace root.
    #[schemars(description = "Read-only shell command, e.g. `grep -rn \"AuthService\" src`")]
    pub command: String,
}

/// Arguments of the `finish` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FinishArgs {
    #[schemars(
        description = "Workspace-relative paths, optionally with a line range: `path`, `path:42` or `path:10-80`"
    )]
    pub files: Vec<String>,
}

/// Tool definition handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// Decoded tool call. Anything else the model sends is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentToolCall {
    Investigate { command: String },
    Finish { files: Vec<String> },
}

impl AgentToolCall {
    pub fn from_raw(name: &str, arguments: &Value) -> ModelResult<Self> {
        // Some transports deliver arguments as a JSON-encoded string.
        let decoded;
        let arguments = match arguments {
            Value::String(raw) => {
                decoded = serde_json::from_str::<Value>(raw).map_err(|err| {
                    ModelError::MalformedToolCall(format!("{name}: arguments are not JSON: {err}"))
                })?;
                &decoded
            }
            other => other,
        };
        match name {
            INVESTIGATE_TOOL => {
                let args: InvestigateArgs = serde_json::from_value(arguments.clone())
                    .map_err(|err| ModelError::MalformedToolCall(format!("{name}: {err}")))?;
                if args.command.trim().is_empty() {
                    return Err(ModelError::MalformedToolCall(
                        "investigate: empty command".to_string(),
                    ));
                }
                Ok(AgentToolCall::Investigate {
                    command: args.command,
                })
            }
            FINISH_TOOL => {
                let args: FinishArgs = serde_json::from_value(arguments.clone())
                    .map_err(|err| ModelError::MalformedToolCall(format!("{name}: {err}")))?;
                Ok(AgentToolCall::Finish { files: args.files })
            }
            other => Err(ModelError::UnknownTool(other.to_string())),
        }
    }
}

fn parameters<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

/// `investigate` and `finish`, with the sandbox allow-list spelled out.
pub fn tool_specs(allowed_commands: &[&str], max_turns: usize) -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: INVESTIGATE_TOOL.to_string(),
            description: format!(
                "Run one read-only shell pipeline in the workspace to inspect files. \
                 Allowed commands: {}. Redirection, `;`, `&`, `&&` and command \
                 substitution are rejected. You have at most {max_turns} turns in total.",
                allowed_commands.join(", ")
            ),
            parameters: parameters::<InvestigateArgs>(),
        },
        ToolSpec {
            name: FINISH_TOOL.to_string(),
            description: "Return the files (and optional line ranges) needed to answer the \
                          request. Call this exactly once when done."
                .to_string(),
            parameters: parameters::<FinishArgs>(),
        },
    ]
}
