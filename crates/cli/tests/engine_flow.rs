use async_trait::async_trait;
use context_agent::{ModelResponse, ScriptedModel, SelectionSource};
use context_cli::{ContextEngine, ContextRequest, EngineConfig, StaticSymbols};
use context_indexer::{DirEntry, FileStat, FsEvent, MemoryFs, WorkspaceFs};
use context_protocol::{NullStatusSink, StatusSink, NO_WORKSPACE_PAYLOAD};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn workspace() -> Arc<MemoryFs> {
    Arc::new(
        MemoryFs::new()
            .with_file(
                "/ws/src/app.ts",
                "import { login } from './auth';\n\nexport function main() {\n  login();\n}\n",
            )
            .with_file(
                "/ws/src/auth.ts",
                "export function login() {\n  return true;\n}\n",
            )
            .with_file("/ws/src/util.ts", "export const answer = 42;\n")
            .with_file("/ws/lib/session.ts", "export class Session {}\n")
            .with_file("/ws/node_modules/dep/index.js", "module.exports = 1;\n"),
    )
}

fn engine(fs: Arc<MemoryFs>) -> ContextEngine {
    ContextEngine::new(EngineConfig::default())
        .with_fs(fs)
        .with_status(Arc::new(NullStatusSink))
}

fn request(query: &str) -> ContextRequest {
    ContextRequest {
        root: Some(PathBuf::from("/ws")),
        request: query.to_string(),
        active_file: Some("src/app.ts".to_string()),
        ..ContextRequest::default()
    }
}

#[tokio::test]
async fn missing_workspace_yields_sentinel() {
    let engine = engine(workspace());
    let cancel = CancellationToken::new();

    let no_root = engine
        .build_context(&ContextRequest::default(), &cancel)
        .await;
    assert_eq!(no_root.prompt, NO_WORKSPACE_PAYLOAD);
    assert!(no_root.included_paths.is_empty());
    assert!(no_root.is_no_workspace());

    let missing = ContextRequest {
        root: Some(PathBuf::from("/nowhere")),
        ..request("anything")
    };
    let result = engine.build_context(&missing, &cancel).await;
    assert!(result.is_no_workspace());
}

#[tokio::test]
async fn heuristic_context_orders_active_file_and_imports_first() {
    let engine = engine(workspace());
    let result = engine
        .build_context(&request("login"), &CancellationToken::new())
        .await;

    assert_eq!(result.selection_source, Some(SelectionSource::Fallback));
    assert_eq!(&result.included_paths[..2], &["src/app.ts", "src/auth.ts"]);
    assert!(!result
        .included_paths
        .iter()
        .any(|path| path.starts_with("node_modules")));
    assert_eq!(result.metrics.candidate_count, 4);
    assert_eq!(result.metrics.processed_count, result.included_paths.len());

    let tree = result.prompt.find("## File tree").unwrap();
    let files = result.prompt.find("## Files").unwrap();
    assert!(tree < files);
}

#[tokio::test]
async fn absolute_active_file_is_made_relative() {
    let engine = engine(workspace());
    let request = ContextRequest {
        active_file: Some("/ws/src/util.ts".to_string()),
        ..request("")
    };
    let result = engine.build_context(&request, &CancellationToken::new()).await;
    assert_eq!(result.included_paths[0], "src/util.ts");
}

#[tokio::test]
async fn symbol_relations_lift_related_files() {
    let symbols = StaticSymbols::from_json(
        r#"{
            "definitions": {"path": "lib/session.ts", "line": 1},
            "symbols": [{"name": "Session", "kind": "class", "path": "lib/session.ts", "line": 1}]
        }"#,
    )
    .unwrap();
    let engine = engine(workspace()).with_symbols(Arc::new(symbols));
    let result = engine
        .build_context(&request(""), &CancellationToken::new())
        .await;

    assert_eq!(&result.included_paths[..2], &["src/app.ts", "lib/session.ts"]);
    assert!(result
        .prompt
        .contains("## Symbols\n- class Session (lib/session.ts:1)"));
}

#[tokio::test]
async fn agent_selection_is_filtered_against_the_scan() {
    let model = ScriptedModel::new(true).with_response(ModelResponse::tool_call(
        "finish",
        json!({"files": ["src/util.ts", "src/deleted.ts"]}),
    ));
    let engine = engine(workspace()).with_model(Arc::new(model));
    let result = engine
        .build_context(&request("answer"), &CancellationToken::new())
        .await;

    assert_eq!(result.selection_source, Some(SelectionSource::Agent));
    assert_eq!(result.included_paths, vec!["src/app.ts", "src/util.ts"]);
}

#[tokio::test]
async fn create_event_invalidates_scan_and_selection() {
    let fs = workspace();
    let model = ScriptedModel::new(true).with_response(ModelResponse::tool_call(
        "finish",
        json!({"files": ["src/auth.ts"]}),
    ));
    let engine = engine(Arc::clone(&fs)).with_model(Arc::new(model));
    let cancel = CancellationToken::new();
    let req = ContextRequest {
        operation_id: Some("op-1".to_string()),
        ..request("login")
    };

    let first = engine.build_context(&req, &cancel).await;
    assert_eq!(first.selection_source, Some(SelectionSource::Agent));
    let second = engine.build_context(&req, &cancel).await;
    assert_eq!(second.selection_source, Some(SelectionSource::Cache));

    fs.insert("/ws/src/new.ts", "export {};\n");
    let stale = engine.build_context(&req, &cancel).await;
    assert_eq!(stale.metrics.candidate_count, 4);

    engine.handle_fs_event(
        Path::new("/ws"),
        &FsEvent::Created(PathBuf::from("/ws/src/new.ts")),
    );
    let fresh = engine.build_context(&req, &cancel).await;
    assert_eq!(fresh.metrics.candidate_count, 5);
    // The script is spent, so a recomputed selection falls back.
    assert_eq!(fresh.selection_source, Some(SelectionSource::Fallback));
}

#[tokio::test]
async fn clear_caches_forces_rescan() {
    let fs = workspace();
    let engine = engine(Arc::clone(&fs));
    let cancel = CancellationToken::new();
    engine.build_context(&request(""), &cancel).await;
    assert_eq!(engine.cache_stats().scan.size, 1);

    fs.remove("/ws/src/util.ts");
    engine.clear_caches(Some(Path::new("/ws")));
    assert_eq!(engine.cache_stats().scan.size, 0);
    let result = engine.build_context(&request(""), &cancel).await;
    assert_eq!(result.metrics.candidate_count, 3);
}

#[tokio::test]
async fn cancelled_request_returns_empty_prompt() {
    let engine = engine(workspace());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = engine.build_context(&request("login"), &cancel).await;
    assert!(result.cancelled);
    assert_eq!(result.prompt, "");
    assert_eq!(result.selection_source, Some(SelectionSource::Cancelled));
}

/// Flags the start of assembly from the status stream.
struct AssemblyPhase(Arc<AtomicBool>);

impl StatusSink for AssemblyPhase {
    fn post_status(&self, message: &str, _is_error: bool) {
        if message == "Assembling context" {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

/// Fires `cancel` on the first file read after assembly has started.
struct CancelOnAssemblyRead {
    inner: Arc<MemoryFs>,
    assembling: Arc<AtomicBool>,
    cancel: CancellationToken,
}

#[async_trait]
impl WorkspaceFs for CancelOnAssemblyRead {
    async fn list_dir(&self, dir: &Path) -> context_indexer::Result<Vec<DirEntry>> {
        self.inner.list_dir(dir).await
    }

    async fn stat(&self, path: &Path) -> context_indexer::Result<FileStat> {
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> context_indexer::Result<Vec<u8>> {
        let bytes = self.inner.read(path).await?;
        if self.assembling.load(Ordering::SeqCst) {
            self.cancel.cancel();
        }
        Ok(bytes)
    }
}

#[tokio::test]
async fn cancellation_during_assembly_keeps_partial_prompt() {
    let cancel = CancellationToken::new();
    let assembling = Arc::new(AtomicBool::new(false));
    let fs = Arc::new(CancelOnAssemblyRead {
        inner: workspace(),
        assembling: Arc::clone(&assembling),
        cancel: cancel.clone(),
    });
    let engine = ContextEngine::new(EngineConfig::default())
        .with_fs(fs)
        .with_status(Arc::new(AssemblyPhase(assembling)));

    let result = engine.build_context(&request("login"), &cancel).await;

    assert!(result.cancelled);
    assert_eq!(result.selection_source, Some(SelectionSource::Fallback));
    assert_eq!(result.included_paths, vec!["src/app.ts"]);
    assert!(result.prompt.contains("## File tree"));
    assert!(result.prompt.contains("### src/app.ts"));
    assert!(!result.prompt.contains("### src/auth.ts"));
}
