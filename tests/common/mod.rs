//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use lm_graph_sync::graph::Graph;
use std::path::PathBuf;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Load one of the workflow files under `tests/fixtures`.
#[allow(dead_code)]
pub fn load_fixture(name: &str) -> Graph {
    Graph::load(fixture_path(name)).unwrap()
}

/// Id of the root graph in `saved_workflow.json`.
#[allow(dead_code)]
pub const WORKFLOW_ID: &str = "6f1d2c34-0000-4a5b-8c9d-1e2f3a4b5c6d";

/// Id of the subgraph defined in `saved_workflow.json`.
#[allow(dead_code)]
pub const STYLE_BLOCK_ID: &str = "8a1c7e52-aaaa-4bbb-8ccc-0d1e2f3a4b5c";
