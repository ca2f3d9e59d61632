use async_trait::async_trait;
use context_agent::{
    AgentConfig, ModelClient, ModelError, ModelRequest, ModelResponse, ModelResult, ScriptedModel,
    SelectionCache, SelectionController, SelectionRequest, SelectionSource, TranscriptEntry,
};
use context_protocol::{CandidateFile, FileSelection, NullStatusSink};
use context_sandbox::CommandSandbox;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/Auth.ts"),
        "export class AuthService {}\n",
    )
    .unwrap();
    fs::write(dir.path().join("src/db.ts"), "export const db = 1;\n").unwrap();
    fs::write(dir.path().join("src/app.ts"), "import './Auth';\n").unwrap();
    dir
}

fn request(root: &Path) -> SelectionRequest {
    SelectionRequest {
        root: root.to_path_buf(),
        request: "how does login work?".to_string(),
        active_file: Some("src/app.ts".to_string()),
        candidates: ["src/Auth.ts", "src/app.ts", "src/db.ts"]
            .iter()
            .map(|path| CandidateFile::new(*path, root.join(path), 32))
            .collect(),
        preselected: vec![FileSelection::whole("src/db.ts")],
        operation_id: None,
        recompute: false,
    }
}

fn controller(model: Arc<dyn ModelClient>, config: AgentConfig) -> SelectionController {
    SelectionController::new(
        Some(model),
        CommandSandbox::default(),
        Arc::new(SelectionCache::default()),
        config,
        Arc::new(NullStatusSink),
    )
}

fn fallback_set() -> Vec<FileSelection> {
    vec![
        FileSelection::whole("src/db.ts"),
        FileSelection::whole("src/app.ts"),
    ]
}

#[cfg(unix)]
#[tokio::test]
async fn investigate_then_finish_merges_and_adds_active_file() {
    let dir = workspace();
    let model = Arc::new(
        ScriptedModel::new(true)
            .with_response(ModelResponse::tool_call(
                "investigate",
                json!({"command": "grep -rn AuthService src"}),
            ))
            .with_response(ModelResponse::tool_call(
                "finish",
                json!({"files": ["src/auth.ts:10-20", "src/Auth.ts:15-30", "src/nope.ts"]}),
            )),
    );
    let outcome = controller(model.clone(), AgentConfig::default())
        .select(&request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(outcome.source, SelectionSource::Agent);
    assert_eq!(outcome.turns_used, 2);
    assert_eq!(
        outcome.selections,
        vec![
            FileSelection::range("src/Auth.ts", 10, 30),
            FileSelection::whole("src/app.ts"),
        ]
    );

    // The second call sees the first command's output.
    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let tool_result = requests[1]
        .messages
        .iter()
        .find_map(|entry| match entry {
            TranscriptEntry::ToolResult { content, .. } => Some(content.clone()),
            _ => None,
        })
        .unwrap();
    assert!(tool_result.contains("src/Auth.ts"), "{tool_result}");
    assert_eq!(requests[1].messages[..2], requests[0].messages[..]);
}

#[cfg(unix)]
#[tokio::test]
async fn investigate_only_agent_stops_at_turn_limit() {
    let dir = workspace();
    let model = ScriptedModel::new(true);
    for _ in 0..10 {
        model.push(Ok(ModelResponse::tool_call(
            "investigate",
            json!({"command": "ls src"}),
        )));
    }
    let model = Arc::new(model);
    let config = AgentConfig {
        max_turns: 3,
        ..AgentConfig::default()
    };
    let outcome = controller(model.clone(), config)
        .select(&request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(outcome.source, SelectionSource::Fallback);
    assert_eq!(outcome.turns_used, 3);
    assert_eq!(model.calls(), 3);
    assert_eq!(outcome.selections, fallback_set());
}

#[tokio::test]
async fn denied_command_becomes_error_tool_result() {
    let dir = workspace();
    let model = Arc::new(
        ScriptedModel::new(true)
            .with_response(ModelResponse::tool_call(
                "investigate",
                json!({"command": "rm -rf /"}),
            ))
            .with_response(ModelResponse::tool_call(
                "finish",
                json!({"files": ["src/db.ts"]}),
            )),
    );
    let outcome = controller(model, AgentConfig::default())
        .select(&request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(outcome.source, SelectionSource::Agent);
    let error = outcome
        .transcript
        .iter()
        .find_map(|entry| match entry {
            TranscriptEntry::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .unwrap();
    assert!(error.starts_with("Error: "), "{error}");
}

#[tokio::test]
async fn transport_and_argument_errors_fall_back() {
    let dir = workspace();
    let broken = Arc::new(
        ScriptedModel::new(true).with_error(ModelError::Transport("connection reset".into())),
    );
    let outcome = controller(broken, AgentConfig::default())
        .select(&request(dir.path()), &CancellationToken::new())
        .await;
    assert_eq!(outcome.source, SelectionSource::Fallback);
    assert_eq!(outcome.selections, fallback_set());

    let malformed = Arc::new(ScriptedModel::new(true).with_response(ModelResponse::tool_call(
        "finish",
        json!({"paths": "src/db.ts"}),
    )));
    let outcome = controller(malformed, AgentConfig::default())
        .select(&request(dir.path()), &CancellationToken::new())
        .await;
    assert_eq!(outcome.source, SelectionSource::Fallback);
}

#[tokio::test]
async fn text_reply_in_tool_mode_is_parsed_as_answer() {
    let dir = workspace();
    let model = Arc::new(
        ScriptedModel::new(true).with_response(ModelResponse::text("[\"src/db.ts:3\"]")),
    );
    let outcome = controller(model, AgentConfig::default())
        .select(&request(dir.path()), &CancellationToken::new())
        .await;
    assert_eq!(outcome.source, SelectionSource::Agent);
    assert_eq!(
        outcome.selections,
        vec![
            FileSelection::range("src/db.ts", 3, 3),
            FileSelection::whole("src/app.ts"),
        ]
    );
}

#[tokio::test]
async fn legacy_path_for_models_without_tools() {
    let dir = workspace();
    let model = Arc::new(ScriptedModel::new(false).with_response(ModelResponse::text(
        "Relevant files:\n[\"./SRC/AUTH.TS\", \"missing.ts\"]",
    )));
    let outcome = controller(model.clone(), AgentConfig::default())
        .select(&request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(outcome.source, SelectionSource::Legacy);
    assert_eq!(outcome.turns_used, 1);
    assert!(model.requests()[0].tools.is_empty());
    assert_eq!(
        outcome.selections,
        vec![
            FileSelection::whole("src/Auth.ts"),
            FileSelection::whole("src/app.ts"),
        ]
    );
}

/// Cancels the shared token while "thinking" and asks for a command.
struct CancellingModel {
    token: CancellationToken,
}

#[async_trait]
impl ModelClient for CancellingModel {
    fn supports_tools(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        _request: ModelRequest,
        _cancel: &CancellationToken,
    ) -> ModelResult<ModelResponse> {
        self.token.cancel();
        Ok(ModelResponse::tool_call(
            "investigate",
            json!({"command": "ls"}),
        ))
    }
}

#[tokio::test]
async fn cancellation_before_sandbox_call_aborts() {
    let dir = workspace();
    let cancel = CancellationToken::new();
    let model = Arc::new(CancellingModel {
        token: cancel.clone(),
    });
    let outcome = controller(model, AgentConfig::default())
        .select(&request(dir.path()), &cancel)
        .await;

    assert_eq!(outcome.source, SelectionSource::Cancelled);
    assert_eq!(outcome.turns_used, 1);
    assert!(!outcome
        .transcript
        .iter()
        .any(|entry| matches!(entry, TranscriptEntry::ToolResult { .. })));
    assert_eq!(outcome.selections, fallback_set());
}

#[tokio::test]
async fn results_are_cached_until_new_operation() {
    let dir = workspace();
    let model = Arc::new(
        ScriptedModel::new(true)
            .with_response(ModelResponse::tool_call(
                "finish",
                json!({"files": ["src/Auth.ts"]}),
            ))
            .with_response(ModelResponse::tool_call(
                "finish",
                json!({"files": ["src/db.ts"]}),
            )),
    );
    let controller = controller(model.clone(), AgentConfig::default());
    let mut req = request(dir.path());
    req.operation_id = Some("op-1".into());

    let first = controller.select(&req, &CancellationToken::new()).await;
    assert_eq!(first.source, SelectionSource::Agent);
    let second = controller.select(&req, &CancellationToken::new()).await;
    assert_eq!(second.source, SelectionSource::Cache);
    assert_eq!(second.selections, first.selections);
    assert_eq!(model.calls(), 1);

    req.operation_id = Some("op-2".into());
    let third = controller.select(&req, &CancellationToken::new()).await;
    assert_eq!(third.source, SelectionSource::Agent);
    assert_eq!(third.selections[0], FileSelection::whole("src/db.ts"));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn disabled_or_missing_model_uses_shortlist() {
    let dir = workspace();
    let controller = SelectionController::new(
        None,
        CommandSandbox::default(),
        Arc::new(SelectionCache::default()),
        AgentConfig::default(),
        Arc::new(NullStatusSink),
    );
    let outcome = controller
        .select(&request(dir.path()), &CancellationToken::new())
        .await;
    assert_eq!(outcome.source, SelectionSource::Fallback);
    assert_eq!(outcome.turns_used, 0);
    assert_eq!(outcome.selections, fallback_set());
}
