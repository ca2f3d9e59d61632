use context_indexer::MemoryFs;
use context_pack::{
    AssemblyInput, ContextAssembler, OrderingSignals, RecentChange, SectionKind,
    BINARY_PLACEHOLDER,
};
use context_protocol::{ContextBudget, FileSelection, SymbolInfo, SymbolKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn workspace() -> Arc<MemoryFs> {
    let long: String = (1..=400)
        .map(|i| format!("    let value_{i} = compute({i});\n"))
        .collect();
    Arc::new(
        MemoryFs::new()
            .with_file("/ws/src/app.ts", "import { login } from './auth';\nlogin();\n")
            .with_file(
                "/ws/src/auth.ts",
                "export function login() {\n  return true;\n}\n",
            )
            .with_file("/ws/src/big.rs", format!("fn big() {{\n{long}}}\n"))
            .with_file("/ws/assets/logo.png", vec![0x89, b'P', b'N', b'G', 0, 0])
            .with_file("/ws/data/blob.txt", b"abc\0def".to_vec()),
    )
}

fn input() -> AssemblyInput {
    let paths = [
        "assets/logo.png",
        "data/blob.txt",
        "src/app.ts",
        "src/auth.ts",
        "src/big.rs",
    ];
    AssemblyInput {
        root: PathBuf::from("/ws"),
        selections: paths.iter().map(|p| FileSelection::whole(*p)).collect(),
        workspace_paths: paths.iter().map(|p| p.to_string()).collect(),
        recent_changes: vec![RecentChange {
            timestamp: "2024-05-01T10:00:00Z".into(),
            path: "src/auth.ts".into(),
            description: "modified".into(),
        }],
        symbols: vec![SymbolInfo {
            name: "login".into(),
            kind: SymbolKind::Function,
            path: "src/auth.ts".into(),
            line: 1,
            container: None,
        }],
        active_symbol: None,
        ordering: OrderingSignals {
            active_file: Some("src/app.ts".into()),
            symbol_paths: ["src/auth.ts".to_string()].into(),
            ..OrderingSignals::default()
        },
    }
}

async fn assemble(budget: ContextBudget) -> context_pack::AssembledContext {
    ContextAssembler::new(workspace())
        .assemble(&input(), &budget, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn sections_and_files_in_order() {
    let out = assemble(ContextBudget::default()).await;

    let positions: Vec<usize> = [
        "## File tree",
        "## Recent changes",
        "## Existing paths",
        "## Symbols",
        "## Files",
    ]
    .iter()
    .map(|header| out.text.find(header).unwrap())
    .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
    assert!(!out.text.contains("## Symbol at cursor"));
    assert!(out.text.contains("- [2024-05-01T10:00:00Z] src/auth.ts: modified"));

    assert_eq!(
        out.included_paths,
        vec![
            "src/app.ts",
            "src/auth.ts",
            "assets/logo.png",
            "data/blob.txt",
            "src/big.rs",
        ]
    );
    assert!(out
        .text
        .contains(&format!("### assets/logo.png\n{BINARY_PLACEHOLDER}")));
    assert!(out
        .text
        .contains(&format!("### data/blob.txt\n{BINARY_PLACEHOLDER}")));
    assert_eq!(out.skipped_for_size, 0);
    assert!(!out.cancelled);
}

#[tokio::test]
async fn oversized_file_is_summarized() {
    let budget = ContextBudget {
        max_per_file_chars: 800,
        ..ContextBudget::default()
    };
    let out = assemble(budget).await;
    let big = &out.text[out.text.find("### src/big.rs").unwrap()..];
    assert!(big.contains("fn big() {\n    let value_1 = compute(1);"));
    assert!(big.contains("let value_19 = compute(19);\n... 382 lines omitted ..."));
    assert!(!big.contains("[truncated: "));
}

#[tokio::test]
async fn summary_over_per_file_budget_is_marked() {
    let budget = ContextBudget {
        max_per_file_chars: 300,
        ..ContextBudget::default()
    };
    let out = assemble(budget).await;
    let big = &out.text[out.text.find("### src/big.rs").unwrap()..];
    assert!(big.starts_with("### src/big.rs\nfn big() {"));
    assert!(big.contains("[truncated: "));
    let event = out
        .truncations
        .iter()
        .find(|t| t.path.as_deref() == Some("src/big.rs"))
        .unwrap();
    assert!(event.kept_chars < event.original_chars);
}

#[tokio::test]
async fn total_budget_stops_and_counts_skipped_files() {
    let full = assemble(ContextBudget::default()).await;
    let files_at = full.text.find("### src/auth.ts").unwrap();
    // Enough for everything before auth.ts plus a little of it.
    let budget = ContextBudget::with_total(files_at + 50);
    let out = assemble(budget).await;

    assert!(out.text.chars().count() <= budget.max_total_chars);
    assert_eq!(out.included_paths, vec!["src/app.ts", "src/auth.ts"]);
    assert_eq!(out.skipped_for_size, 3);
    assert!(out.text.contains("[truncated: "));
}

#[tokio::test]
async fn tiny_budget_omits_rather_than_overflows() {
    let out = assemble(ContextBudget::with_total(10)).await;
    assert!(out.text.chars().count() <= 10);
    assert!(out.omitted_sections.contains(&SectionKind::Files));
    assert!(out.included_paths.is_empty());
}

#[tokio::test]
async fn output_is_deterministic() {
    let a = assemble(ContextBudget::with_total(2_000)).await;
    let b = assemble(ContextBudget::with_total(2_000)).await;
    assert_eq!(a.text, b.text);
    assert_eq!(a.included_paths, b.included_paths);
}

#[tokio::test]
async fn cancelled_assembly_returns_partial_output() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let out = ContextAssembler::new(workspace())
        .assemble(&input(), &ContextBudget::default(), &cancel)
        .await;
    assert!(out.cancelled);
    assert_eq!(out.text, "");
}

#[tokio::test]
async fn range_selection_is_focused() {
    let mut input = input();
    input.selections = vec![FileSelection::range("src/big.rs", 200, 202)];
    let out = ContextAssembler::new(workspace())
        .assemble(&input, &ContextBudget::default(), &CancellationToken::new())
        .await;
    assert!(out.text.contains("### src/big.rs (lines 200-202)"));
    assert!(out.text.contains("let value_199 = compute(199);"));
    assert!(!out.text.contains("let value_100 = compute(100);"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn never_exceeds_total_budget(total in 0usize..6_000, per_file in 0usize..3_000) {
        let budget = ContextBudget {
            max_total_chars: total,
            max_per_file_chars: per_file,
            ..ContextBudget::with_total(total)
        };
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let out = runtime.block_on(assemble(budget));
        prop_assert!(out.text.chars().count() <= total);
    }
}
