//! # lm-graph-sync
//!
//! Graph-side logic for LoRA manager nodes in a node-based image generation workflow.
//!
//! ## Overview
//!
//! Workflows are directed graphs of nodes that may nest whole subgraphs inside one
//! another. LoRA provider nodes (stackers, randomizers, cyclers) are chained through a
//! `lora_stack` input, and every provider applies its own active LoRAs plus whatever its
//! upstream providers apply. This crate answers the questions an editor front-end needs
//! answered as the user edits such a graph:
//!
//! - Which LoRAs are active at a given node, across a possibly cyclic chain?
//! - How does a free-text `<lora:name:strength>` prompt reconcile with the structured
//!   widget list?
//! - Which trigger-word toggle nodes need new trigger words, and what do we send the
//!   backend for them?
//!
//! ## Architecture
//!
//! - **[`graph`]**: Typed graph model covering runtime and saved-workflow shapes, plus
//!   failure-free lookup across subgraphs ([`graph::access`])
//! - **[`nodekey`]**: Graph-qualified node identity (`graph_id:node_id`)
//! - **[`lora`]**: LoRA entries, tag parsing and text/list reconciliation
//! - **[`chain`]**: Active-LoRA aggregation along provider chains
//! - **[`trigger`]**: Trigger-word requests and the fire-and-forget backend client
//! - **[`event`]**: Graph edit events and the handler that keeps trigger words in step
//! - **[`config`]**: Backend location and the node class registry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lm_graph_sync::{
//!     chain::collect_active_loras_for_ref, config::NodeClasses, graph::Graph, nodekey::NodeRef,
//! };
//!
//! fn main() -> Result<(), lm_graph_sync::LoraSyncError> {
//!     let workflow = Graph::load("workflow.json")?;
//!     let node: NodeRef = "root:12".parse()?;
//!     let active = collect_active_loras_for_ref(&workflow, &node, NodeClasses::builtin());
//!     for name in active {
//!         println!("{name}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Keeping trigger words in sync
//!
//! ```rust,no_run
//! use lm_graph_sync::{
//!     config::SyncConfig,
//!     event::{GraphEvent, GraphEventHandler},
//!     graph::Graph,
//!     nodekey::NodeRef,
//!     trigger::{HttpTriggerWordClient, TriggerWordSync},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), lm_graph_sync::LoraSyncError> {
//!     let config = SyncConfig::default();
//!     let sync = TriggerWordSync::new(HttpTriggerWordClient::new(&config)?, config.classes);
//!     let workflow = Graph::load("workflow.json")?;
//!     sync.on_event(
//!         &workflow,
//!         &GraphEvent::WidgetChanged {
//!             node: NodeRef::new(None, 12),
//!             widget: "loras".to_string(),
//!         },
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: Graph model, chain aggregation and the HTTP trigger-word client
//! - **bin**: The `lm-graph` command line tool
//! - **wasm**: WebAssembly bindings for the editor front-end

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod lora;
pub mod nodekey;
#[cfg(test)]
mod tests;
pub mod trigger;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::*;
