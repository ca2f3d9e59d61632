use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Command denied: {0}")]
    Denied(String),

    #[error("Command failed ({}): {stderr}", describe_status(.status))]
    ExecutionFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Command cancelled")]
    Cancelled,
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit {code}"),
        None => "no exit status".to_string(),
    }
}

impl SandboxError {
    pub(crate) fn denied(reason: impl Into<String>) -> Self {
        SandboxError::Denied(reason.into())
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, SandboxError::Denied(_))
    }
}
