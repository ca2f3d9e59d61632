use crate::error::{PackError, Result};
use context_indexer::WorkspaceFs;
use context_protocol::exclusions::is_binary_extension;
use context_protocol::paths::extension;
use std::path::Path;

pub const BINARY_PLACEHOLDER: &str = "[binary file omitted]";

/// Bytes sniffed for NUL before trusting a file as text.
const SNIFF_BYTES: usize = 8 * 1024;

pub fn looks_binary_by_extension(path: &str) -> bool {
    extension(path).is_some_and(|ext| is_binary_extension(&ext))
}

/// Decodes `bytes` as text; NUL in the head or invalid UTF-8 means binary.
pub fn decode_text(path: &str, bytes: Vec<u8>) -> Result<String> {
    if bytes.iter().take(SNIFF_BYTES).any(|&b| b == 0) {
        return Err(PackError::Binary(path.to_string()));
    }
    String::from_utf8(bytes).map_err(|_| PackError::Binary(path.to_string()))
}

/// Reads a workspace file as text. Binary extensions are rejected before
/// any bytes are read.
pub async fn load_text(fs: &dyn WorkspaceFs, root: &Path, path: &str) -> Result<String> {
    if looks_binary_by_extension(path) {
        return Err(PackError::Binary(path.to_string()));
    }
    let bytes = fs
        .read(&root.join(path))
        .await
        .map_err(|source| PackError::Read {
            path: path.to_string(),
            source,
        })?;
    decode_text(path, bytes)
}
