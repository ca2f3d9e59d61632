//! # Context Sandbox
//!
//! Read-only command execution for investigative agents.
//!
//! ```text
//! command string
//!     │
//!     ├──> policy: raw deny tokens, quote-aware `|` split, allow-list,
//!     │            per-verb rules (git/sed/awk/find/xargs/...)
//!     ├──> rewrite: exclusions for recursive grep/rg/find, `ls -R` -> `git ls-files`
//!     └──> exec: `sh -c` in the workspace, capped stdout, cancellable
//! ```

mod error;
mod exec;
mod policy;
mod rewrite;
mod segment;

pub use error::{Result, SandboxError};
pub use exec::{is_tool_available, CommandSandbox, SandboxConfig};
pub use policy::{
    allowed_commands, is_allowed_command, validate_command, validate_segment, ALLOWED_COMMANDS,
    DENY_TOKENS, GIT_READ_ONLY_SUBCOMMANDS,
};
pub use rewrite::{rewrite_command, rewrite_segment, RewriteContext};
pub use segment::{split_pipeline, tokenize, Token};
