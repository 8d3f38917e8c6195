//! Per-channel "last processed event" cursors.
//!
//! Every document (the root and each embedded document) carries a
//! `checkpoint` contract. When a caller-supplied event reaches a channel, the
//! checkpoint processor hashes it and the driver writes the hash to
//! `contracts/checkpoint/lastEvents/<channel>/blueId` once the event's
//! reactions have drained.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::constants::{CHANNEL_EVENT_CHECKPOINT, CHECKPOINT_CONTRACT_NAME, CONTRACTS_KEY};
use crate::context::ProcessingContext;
use crate::document::{collect_embedded_paths, Document, TypeRef};
use crate::error::ProcessorResult;
use crate::event::{EventNode, EventSource};
use crate::patch::{apply_patches, Patch};
use crate::path::{escape_segment, make_path};
use crate::registry::{ContractProcessor, ContractRole};

/// Pending checkpoint writes for the event currently being processed,
/// keyed by `(document base, channel)`. The last record for a key wins.
#[derive(Debug, Default)]
pub struct CheckpointCache {
    entries: Mutex<BTreeMap<(String, String), String>>,
}

impl CheckpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, document_base: &str, channel: &str, blue_id: String) {
        self.lock()
            .insert((document_base.to_string(), channel.to_string()), blue_id);
    }

    /// Drains the cache into `add` patches, in `(base, channel)` order.
    /// Entries whose document no longer exists in `document` are dropped.
    pub fn flush(&self, document: &Document) -> Vec<Patch> {
        let entries = std::mem::take(&mut *self.lock());
        entries
            .into_iter()
            .filter(|((base, _), _)| document.node(base).is_some())
            .map(|((base, channel), blue_id)| {
                let path = make_path(
                    &base,
                    &format!(
                        "{CONTRACTS_KEY}/{CHECKPOINT_CONTRACT_NAME}/lastEvents/{}",
                        escape_segment(&channel)
                    ),
                );
                Patch::add(path, json!({ "blueId": blue_id }))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handler for `Channel Event Checkpoint` contracts.
pub struct ChannelEventCheckpointProcessor {
    cache: Arc<CheckpointCache>,
}

impl ChannelEventCheckpointProcessor {
    pub fn new(cache: Arc<CheckpointCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ContractProcessor for ChannelEventCheckpointProcessor {
    fn contract_type(&self) -> &str {
        CHANNEL_EVENT_CHECKPOINT
    }

    fn contract_blue_id(&self) -> &str {
        CHANNEL_EVENT_CHECKPOINT
    }

    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }

    /// Only the first channel hop of a caller-supplied event qualifies.
    fn supports(&self, event: &EventNode, _: &Value, _: &ProcessingContext, _: &str) -> bool {
        event.is_channel()
            && event.root_event.as_ref().is_some_and(|root| {
                event.shares_payload_with(root) && root.source == Some(EventSource::External)
            })
    }

    async fn handle(
        &self,
        event: &EventNode,
        _contract: &Value,
        ctx: &mut ProcessingContext,
        _contract_name: &str,
    ) -> Result<()> {
        let (Some(channel), Some(root)) = (event.channel_name.as_deref(), event.root_event.as_ref()) else {
            return Ok(());
        };
        if root.seq.is_none() {
            return Ok(());
        }

        let blue_id = ctx.blue().calculate_blue_id(&root.payload).await?;
        let base = document_base(ctx.node_path());
        debug!(document = %base, channel, blue_id = %blue_id, "checkpoint recorded");
        self.cache.record(&base, channel, blue_id);
        Ok(())
    }
}

fn document_base(node_path: &str) -> String {
    let suffix = format!("/{CONTRACTS_KEY}/{CHECKPOINT_CONTRACT_NAME}");
    match node_path.strip_suffix(suffix.as_str()) {
        Some("") => "/".to_string(),
        Some(base) => base.to_string(),
        None => node_path.to_string(),
    }
}

/// Adds an empty checkpoint contract to the root and to every embedded
/// document that lacks one. Returns the same snapshot when nothing changes.
pub fn ensure_checkpoint_contracts(document: &Document) -> ProcessorResult<Document> {
    let mut bases = vec!["/".to_string()];
    for spec in collect_embedded_paths(document.as_value()) {
        if !bases.contains(&spec.abs_path) {
            bases.push(spec.abs_path);
        }
    }

    let mut patches = Vec::new();
    for base in bases {
        if document.node(&base).is_none() {
            continue;
        }
        match document.contract(&base, CHECKPOINT_CONTRACT_NAME) {
            Some(existing) if is_checkpoint(existing) => continue,
            Some(existing) => warn!(
                document = %base,
                contract_type = ?TypeRef::of(existing).map(|t| t.to_string()),
                "replacing checkpoint contract of unexpected type"
            ),
            None => {}
        }
        patches.push(Patch::add(
            make_path(&base, &format!("{CONTRACTS_KEY}/{CHECKPOINT_CONTRACT_NAME}")),
            json!({ "type": CHANNEL_EVENT_CHECKPOINT, "lastEvents": {} }),
        ));
    }

    apply_patches(document, &patches)
}

fn is_checkpoint(contract: &Value) -> bool {
    TypeRef::of(contract)
        .is_some_and(|t| t.matches(CHANNEL_EVENT_CHECKPOINT, CHANNEL_EVENT_CHECKPOINT))
}
