//! lm-graph CLI tool
//!
//! Inspect saved workflows the way the editor integration sees them.
//!
//! ## Commands
//!
//! - `nodes <workflow>`: Every node across all subgraphs, with its key and class
//! - `chain <workflow> --node <id>`: Active LoRAs applied at a node
//! - `merge --text <text>`: Reconcile tag text against a loras list
//! - `triggers <workflow> --node <id>`: Trigger-word request for a node, optionally sent
//!
//! The backend URL for `triggers --send` comes from `--base-url`, then the
//! `LM_GRAPH_BASE_URL` environment variable, then the config file.

use clap::{Parser, Subcommand};
use lm_graph_sync::{
    chain::collect_active_loras_from_chain,
    config::{ConfigProvider, SyncConfig, TomlConfigProvider},
    graph::{
        access::{all_graph_nodes, node_from_graph},
        Graph, NodeId,
    },
    lora::{format_lora_tags, merge_loras, LoraEntry},
    trigger::{trigger_word_request, HttpTriggerWordClient, TriggerWordBackend},
    LoraSyncError,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lm-graph")]
#[command(author, version, about = "Inspect LoRA chains in saved workflows", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every node in the workflow and its subgraphs
    Nodes {
        /// Path to the workflow JSON
        workflow: PathBuf,
    },

    /// Print the active LoRAs applied at a node
    Chain {
        /// Path to the workflow JSON
        workflow: PathBuf,

        /// Node id within its graph
        #[arg(long)]
        node: String,

        /// Subgraph id (default: the root graph)
        #[arg(long)]
        graph: Option<String>,
    },

    /// Merge `<lora:...>` text into a loras list and print the result
    Merge {
        /// Tag text, e.g. "<lora:style:0.8> <lora:detail:0.5:1.0>"
        #[arg(long)]
        text: String,

        /// JSON file holding the current loras list
        #[arg(long)]
        loras: Option<PathBuf>,

        /// Print the merged list back as tag text instead of JSON
        #[arg(long)]
        tags: bool,
    },

    /// Build the trigger-word request for a node's toggles
    Triggers {
        /// Path to the workflow JSON
        workflow: PathBuf,

        /// Node id within its graph
        #[arg(long)]
        node: String,

        /// Subgraph id (default: the root graph)
        #[arg(long)]
        graph: Option<String>,

        /// POST the request to the backend instead of only printing it
        #[arg(long)]
        send: bool,

        /// Backend base URL (e.g., <http://127.0.0.1:8188>)
        /// Can also be set via LM_GRAPH_BASE_URL environment variable
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<SyncConfig, LoraSyncError> {
    match path {
        Some(path) => TomlConfigProvider::new(path).get_config(),
        None => Ok(SyncConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Nodes { workflow } => {
            let graph = Graph::load(&workflow)?;
            for node in all_graph_nodes(&graph) {
                let state = if node.is_active() { "" } else { " (inactive)" };
                println!(
                    "{}\t{}{state}",
                    node.key(),
                    node.class_tag().unwrap_or("<unknown>")
                );
            }
            Ok(())
        }

        Commands::Chain {
            workflow,
            node,
            graph,
        } => {
            let root = Graph::load(&workflow)?;
            let node_id: NodeId = node.parse().unwrap_or_else(|never| match never {});
            let Some(found) = node_from_graph(&root, graph.as_deref(), &node_id) else {
                eprintln!("Error: node {node_id} not found");
                std::process::exit(1);
            };
            for name in collect_active_loras_from_chain(found, &config.classes) {
                println!("{name}");
            }
            Ok(())
        }

        Commands::Merge { text, loras, tags } => {
            let current: Vec<LoraEntry> = match loras {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => Vec::new(),
            };
            let merged = merge_loras(&text, &current);
            if tags {
                println!("{}", format_lora_tags(&merged));
            } else {
                println!("{}", serde_json::to_string_pretty(&merged)?);
            }
            Ok(())
        }

        Commands::Triggers {
            workflow,
            node,
            graph,
            send,
            base_url,
        } => {
            let root = Graph::load(&workflow)?;
            let node_id: NodeId = node.parse().unwrap_or_else(|never| match never {});
            let Some(found) = node_from_graph(&root, graph.as_deref(), &node_id) else {
                eprintln!("Error: node {node_id} not found");
                std::process::exit(1);
            };
            let names = collect_active_loras_from_chain(found, &config.classes);
            let Some(request) = trigger_word_request(found, &names, &config.classes) else {
                println!("No trigger word toggles connected to {}", found.key());
                return Ok(());
            };
            println!("{}", serde_json::to_string_pretty(&request)?);

            if send {
                // Read base_url from environment if not provided via CLI
                let base_url = base_url.or_else(|| std::env::var("LM_GRAPH_BASE_URL").ok());
                let config = match base_url {
                    Some(url) => config.with_base_url(&url)?,
                    None => config,
                };
                let client = HttpTriggerWordClient::new(&config)?;
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(client.send_trigger_words(&request))?;
                println!("✓ Sent to {}", client.url());
            }
            Ok(())
        }
    }
}
