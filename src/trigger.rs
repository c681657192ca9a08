//! Trigger-word synchronization with the backend.
//!
//! Whenever the set of LoRAs applied at a node changes, the trigger-word toggle nodes fed
//! by that node need the matching trigger words. This module builds the request for the
//! backend's trigger-word endpoint and sends it detached: the caller never waits on it,
//! and a failed send is logged and otherwise ignored.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, future::Future, sync::Arc};
use url::Url;

use crate::{
    chain::{collect_active_loras_from_chain, connected_trigger_toggle_nodes, downstream_chain_nodes},
    config::{NodeClasses, SyncConfig},
    graph::GraphNode,
    nodekey::NodeRef,
    LoraSyncError,
};

/// Body of `POST /api/lm/loras/get_trigger_words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerWordRequest {
    pub lora_names: Vec<String>,
    pub node_ids: Vec<NodeRef>,
}

/// The request that would update `node`'s toggle nodes, or `None` if no toggle node is
/// connected.
pub fn trigger_word_request(
    node: GraphNode<'_>,
    lora_names: &BTreeSet<String>,
    classes: &NodeClasses,
) -> Option<TriggerWordRequest> {
    let toggles = connected_trigger_toggle_nodes(node, classes);
    if toggles.is_empty() {
        return None;
    }
    Some(TriggerWordRequest {
        lora_names: lora_names.iter().cloned().collect(),
        node_ids: toggles.iter().map(GraphNode::reference).collect(),
    })
}

/// `Send + Sync` natively; no bound in the browser, where futures are `!Send`.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSendSync for T {}

/// Whatever accepts trigger-word updates. The response body is not consumed.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait TriggerWordBackend: MaybeSendSync {
    async fn send_trigger_words(&self, request: &TriggerWordRequest) -> Result<(), LoraSyncError>;
}

/// [TriggerWordBackend] talking JSON over HTTP to the editor's backend.
#[derive(Clone)]
pub struct HttpTriggerWordClient {
    client: Client,
    url: Url,
}

impl HttpTriggerWordClient {
    pub fn new(config: &SyncConfig) -> Result<Self, LoraSyncError> {
        Ok(HttpTriggerWordClient {
            client: Client::new(),
            url: config.trigger_words_url()?,
        })
    }

    /// Set custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl std::fmt::Debug for HttpTriggerWordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTriggerWordClient")
            .field("url", &self.url.as_str())
            .finish()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl TriggerWordBackend for HttpTriggerWordClient {
    async fn send_trigger_words(&self, request: &TriggerWordRequest) -> Result<(), LoraSyncError> {
        tracing::debug!(
            "[HttpTriggerWordClient] POST {} ({} names, {} nodes)",
            self.url,
            request.lora_names.len(),
            request.node_ids.len()
        );
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoraSyncError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_detached<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => {
            tracing::warn!("[spawn_detached] no tokio runtime available, update dropped");
        }
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
fn spawn_detached<F>(task: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(task);
}

#[cfg(all(target_arch = "wasm32", not(feature = "wasm")))]
fn spawn_detached<F>(_task: F)
where
    F: Future<Output = ()> + 'static,
{
    tracing::warn!("[spawn_detached] built without the 'wasm' feature, update dropped");
}

/// Keeps trigger-word toggle nodes in step with the LoRA chains feeding them.
pub struct TriggerWordSync<B> {
    backend: Arc<B>,
    classes: NodeClasses,
}

impl<B> TriggerWordSync<B>
where
    B: TriggerWordBackend + 'static,
{
    pub fn new(backend: B, classes: NodeClasses) -> Self {
        TriggerWordSync {
            backend: Arc::new(backend),
            classes,
        }
    }

    pub fn classes(&self) -> &NodeClasses {
        &self.classes
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn request_for(
        &self,
        node: GraphNode<'_>,
        lora_names: &BTreeSet<String>,
    ) -> Option<TriggerWordRequest> {
        trigger_word_request(node, lora_names, &self.classes)
    }

    /// Send `lora_names` to every toggle node connected to `node` without waiting for the
    /// result. Returns the request that was dispatched.
    pub fn update_connected_trigger_words(
        &self,
        node: GraphNode<'_>,
        lora_names: &BTreeSet<String>,
    ) -> Option<TriggerWordRequest> {
        let request = self.request_for(node, lora_names)?;
        let backend = Arc::clone(&self.backend);
        let payload = request.clone();
        spawn_detached(async move {
            if let Err(e) = backend.send_trigger_words(&payload).await {
                tracing::warn!("[update_connected_trigger_words] trigger word update failed: {e}");
            }
        });
        Some(request)
    }

    /// Recompute `node`'s chain and push it to its toggle nodes.
    pub fn refresh(&self, node: GraphNode<'_>) -> Option<TriggerWordRequest> {
        let names = collect_active_loras_from_chain(node, &self.classes);
        self.update_connected_trigger_words(node, &names)
    }

    /// Refresh `node` and every provider or loader downstream of it.
    pub fn refresh_downstream(&self, node: GraphNode<'_>) -> Vec<TriggerWordRequest> {
        std::iter::once(node)
            .chain(downstream_chain_nodes(node, &self.classes))
            .filter_map(|affected| self.refresh(affected))
            .collect()
    }
}
