//! Per-invocation scratchpad handed to contract processors.

use std::sync::Arc;

use serde_json::Value;

use crate::blue::Blue;
use crate::document::Document;
use crate::event::{EventNode, ProcessingAction};
use crate::patch::Patch;
use crate::path::make_path;

/// Observer invoked with every non-empty batch of flushed actions.
pub type FlushHook = Box<dyn FnMut(&[ProcessingAction]) + Send>;

/// Reads the snapshot a contract was invoked against and buffers the patches
/// and events it produces. Nothing leaves the context until [`flush`].
///
/// [`flush`]: ProcessingContext::flush
pub struct ProcessingContext {
    document: Document,
    node_path: String,
    contract_name: String,
    event: EventNode,
    blue: Arc<dyn Blue>,
    actions: Vec<ProcessingAction>,
    on_flush: Option<FlushHook>,
}

impl ProcessingContext {
    pub fn new(
        document: Document,
        node_path: impl Into<String>,
        contract_name: impl Into<String>,
        event: EventNode,
        blue: Arc<dyn Blue>,
    ) -> Self {
        Self {
            document,
            node_path: node_path.into(),
            contract_name: contract_name.into(),
            event,
            blue,
            actions: Vec::new(),
            on_flush: None,
        }
    }

    pub fn with_flush_hook(mut self, hook: FlushHook) -> Self {
        self.on_flush = Some(hook);
        self
    }

    /// Value at `path`, resolved beneath the invoking contract's node.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.document.get(&self.resolve_path(path))
    }

    /// Buffers `patch` with its paths rebased onto the contract's node.
    pub fn add_patch(&mut self, patch: Patch) {
        self.actions
            .push(ProcessingAction::Patch(patch.rebased(&self.node_path)));
    }

    /// Buffers `event`, stamping its origin, root event and trace.
    pub fn emit_event(&mut self, mut event: EventNode) {
        if event.origin_node_path.is_none() {
            event.origin_node_path = Some(self.node_path.clone());
        }
        if event.root_event.is_none() {
            event.root_event = Some(
                self.event
                    .root_event
                    .clone()
                    .unwrap_or_else(|| Arc::new(self.event.clone())),
            );
        }
        let own = std::mem::take(&mut event.trace);
        event.trace = self.event.trace.iter().cloned().chain(own).collect();

        self.actions.push(ProcessingAction::Event(event));
    }

    /// Drains the buffer, notifies the flush hook and returns the actions.
    pub fn flush(&mut self) -> Vec<ProcessingAction> {
        if self.actions.is_empty() {
            return Vec::new();
        }
        let out = std::mem::take(&mut self.actions);
        if let Some(hook) = self.on_flush.as_mut() {
            hook(&out);
        }
        out
    }

    pub fn node_path(&self) -> &str {
        &self.node_path
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn resolve_path(&self, path: &str) -> String {
        make_path(&self.node_path, path)
    }

    /// The event this invocation reacts to.
    pub fn event(&self) -> &EventNode {
        &self.event
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn blue(&self) -> &dyn Blue {
        self.blue.as_ref()
    }
}

impl std::fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("node_path", &self.node_path)
            .field("contract_name", &self.contract_name)
            .field("pending_actions", &self.actions.len())
            .finish()
    }
}
