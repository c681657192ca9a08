//! WASM bindings for the editor front-end.
//!
//! The editor serializes its live graph (`app.graph`) to JSON and hands it to
//! [WorkflowGraphWasm]; every query then runs against that snapshot. After an edit the
//! editor pushes a fresh snapshot with `updateGraph` and reports the edit with
//! `handleEvent`, which refreshes the affected trigger-word toggles in the background.
//!
//! ## Usage
//!
//! ```javascript,ignore
//! import init, { WorkflowGraphWasm, mergeLoras } from './lm_graph_sync.js';
//!
//! await init();
//! const graph = new WorkflowGraphWasm(JSON.stringify(app.graph.serialize()));
//! graph.connect(window.location.origin);
//!
//! const active = graph.collectActiveLoras(null, 12);   // ["a.safetensors", ...]
//! const merged = mergeLoras(textWidget.value, lorasWidget.value);
//!
//! graph.updateGraph(JSON.stringify(app.graph.serialize()));
//! graph.handleEvent({ kind: "mode_changed", node: { node_id: 12, graph_id: "root" }, mode: 4 });
//! ```
//!
//! Returned collections are arrays or plain objects, never JavaScript `Map`s.

use wasm_bindgen::prelude::*;
use web_sys::console;

use crate::{
    chain::collect_active_loras_from_chain,
    config::{NodeClasses, SyncConfig},
    event::GraphEvent,
    graph::{
        access::{all_graph_nodes, node_from_graph},
        Graph, GraphNode, NodeId,
    },
    lora::{format_lora_tags, lora_entries_from_values, merge_loras, LoraEntry},
    trigger::{trigger_word_request, HttpTriggerWordClient, TriggerWordRequest, TriggerWordSync},
    LoraSyncError,
};

impl From<LoraSyncError> for JsValue {
    fn from(e: LoraSyncError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from(LoraSyncError::from(e)))
}

/// Node ids arrive as JS numbers or strings.
fn node_id_from_js(node_id: &JsValue) -> Option<NodeId> {
    if let Some(num) = node_id.as_f64() {
        return NodeId::from_f64(num);
    }
    node_id.as_string().map(|id| id.parse().unwrap_or_else(|never| match never {}))
}

/// Route `tracing` output to the browser console. Safe to call more than once.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    if tracing_wasm::try_set_as_global_default().is_err() {
        console::log_1(&"tracing already initialized".into());
    }
}

/// Reconcile the loras text widget against the structured list.
///
/// Returns the merged entry array; neither argument is modified.
#[wasm_bindgen(js_name = mergeLoras)]
pub fn merge_loras_js(loras_text: &str, loras_arr: JsValue) -> Result<JsValue, JsValue> {
    to_js(&merge_loras(loras_text, &entries_from_js(loras_arr)))
}

/// Render a list of entries as `<lora:...>` tag text.
#[wasm_bindgen(js_name = formatLoraTags)]
pub fn format_lora_tags_js(entries: JsValue) -> String {
    format_lora_tags(&entries_from_js(entries))
}

/// Entries of a JS array. Anything that is not an array reads as empty and rows that do
/// not parse are skipped.
fn entries_from_js(value: JsValue) -> Vec<LoraEntry> {
    if value.is_null() || value.is_undefined() {
        return Vec::new();
    }
    match serde_wasm_bindgen::from_value::<Vec<serde_json::Value>>(value) {
        Ok(values) => lora_entries_from_values(&values),
        Err(e) => {
            console::warn_1(&format!("⚠️ Ignoring loras list that is not an array: {e}").into());
            Vec::new()
        }
    }
}

/// A snapshot of the editor's graph, including every nested subgraph.
#[wasm_bindgen]
pub struct WorkflowGraphWasm {
    graph: Graph,
    classes: NodeClasses,
    sync: Option<TriggerWordSync<HttpTriggerWordClient>>,
}

impl WorkflowGraphWasm {
    fn find(&self, graph_id: Option<String>, node_id: &JsValue) -> Option<GraphNode<'_>> {
        let Some(id) = node_id_from_js(node_id) else {
            console::warn_1(&format!("⚠️ Unsupported node id: {:?}", node_id).into());
            return None;
        };
        let found = node_from_graph(&self.graph, graph_id.as_deref(), &id);
        if found.is_none() {
            tracing::debug!(
                "[WorkflowGraphWasm] node {id} not found in graph {:?}",
                graph_id.as_deref().unwrap_or("root")
            );
        }
        found
    }
}

#[wasm_bindgen]
impl WorkflowGraphWasm {
    /// Parse a graph snapshot. Both the runtime shape and saved workflows are accepted.
    #[wasm_bindgen(constructor)]
    pub fn new(json: &str) -> Result<WorkflowGraphWasm, JsValue> {
        let graph = Graph::from_json(json).map_err(|e| {
            let msg = format!("Failed to parse graph: {e}");
            console::error_1(&msg.clone().into());
            JsValue::from_str(&msg)
        })?;
        console::log_1(&format!("✅ Loaded graph with {} nodes", all_graph_nodes(&graph).len()).into());
        Ok(WorkflowGraphWasm {
            graph,
            classes: NodeClasses::default(),
            sync: None,
        })
    }

    /// Replace the node class registry with the `[classes]` table of a TOML config.
    #[wasm_bindgen(js_name = configure)]
    pub fn configure(&mut self, config_toml: &str) -> Result<(), JsValue> {
        let config = SyncConfig::from_toml_str(config_toml)?;
        self.classes = config.classes;
        if let Some(sync) = self.sync.take() {
            let client = sync.backend().clone();
            self.sync = Some(TriggerWordSync::new(client, self.classes.clone()));
        }
        Ok(())
    }

    /// Enable trigger-word updates against the backend at `base_url`.
    #[wasm_bindgen]
    pub fn connect(&mut self, base_url: &str) -> Result<(), JsValue> {
        let config = SyncConfig {
            classes: self.classes.clone(),
            ..SyncConfig::default()
        }
        .with_base_url(base_url)?;
        let client = HttpTriggerWordClient::new(&config)?;
        console::log_1(&format!("✅ Trigger word endpoint: {}", client.url()).into());
        self.sync = Some(TriggerWordSync::new(client, config.classes));
        Ok(())
    }

    /// Swap in a new snapshot after the editor changed the graph.
    #[wasm_bindgen(js_name = updateGraph)]
    pub fn update_graph(&mut self, json: &str) -> Result<(), JsValue> {
        self.graph = Graph::from_json(json)?;
        Ok(())
    }

    /// Sorted names of every active LoRA applied at the node. Returns an empty array
    /// if the node does not exist.
    #[wasm_bindgen(js_name = collectActiveLoras)]
    pub fn collect_active_loras(
        &self,
        graph_id: Option<String>,
        node_id: JsValue,
    ) -> Result<JsValue, JsValue> {
        let names: Vec<String> = self
            .find(graph_id, &node_id)
            .map(|node| collect_active_loras_from_chain(node, &self.classes))
            .unwrap_or_default()
            .into_iter()
            .collect();
        to_js(&names)
    }

    /// `graph_id:node_id` key of the node, or `undefined` if it does not exist.
    #[wasm_bindgen(js_name = nodeKey)]
    pub fn node_key(&self, graph_id: Option<String>, node_id: JsValue) -> Option<String> {
        self.find(graph_id, &node_id)
            .map(|node| node.key().to_string())
    }

    /// Keys of every node in the graph and its subgraphs, in traversal order.
    #[wasm_bindgen(js_name = allNodeKeys)]
    pub fn all_node_keys(&self) -> Result<JsValue, JsValue> {
        let keys: Vec<String> = all_graph_nodes(&self.graph)
            .iter()
            .map(|node| node.key().to_string())
            .collect();
        to_js(&keys)
    }

    /// The request body that would update the node's trigger-word toggles, or `null`
    /// when no toggle is connected.
    #[wasm_bindgen(js_name = triggerWordRequest)]
    pub fn trigger_word_request(
        &self,
        graph_id: Option<String>,
        node_id: JsValue,
    ) -> Result<JsValue, JsValue> {
        let Some(node) = self.find(graph_id, &node_id) else {
            return Ok(JsValue::NULL);
        };
        let names = collect_active_loras_from_chain(node, &self.classes);
        match trigger_word_request(node, &names, &self.classes) {
            Some(request) => to_js(&request),
            None => Ok(JsValue::NULL),
        }
    }

    /// Report an edit. Returns the requests dispatched to the backend; they complete in
    /// the background and failures only reach the console.
    #[wasm_bindgen(js_name = handleEvent)]
    pub fn handle_event(&self, event: JsValue) -> Result<JsValue, JsValue> {
        let event: GraphEvent =
            serde_wasm_bindgen::from_value(event).map_err(LoraSyncError::from)?;
        let Some(sync) = &self.sync else {
            console::warn_1(&"⚠️ handleEvent called before connect(), ignoring".into());
            return to_js(&Vec::<TriggerWordRequest>::new());
        };
        to_js(&sync.handle_event(&self.graph, &event))
    }
}
