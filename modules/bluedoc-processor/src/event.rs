//! Events flowing through the router and the actions contracts buffer.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::constants::{DOCUMENT_PROCESSING_INITIATED, DOCUMENT_UPDATE, TIMELINE_ENTRY};
use crate::patch::Patch;

/// Where an event entered the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Supplied by the caller of a batch.
    External,
    /// Re-emitted by a channel adapter.
    Channel,
    /// Synthesized by the engine itself (lifecycle, bootstrap).
    Internal,
}

/// An event together with its routing metadata.
///
/// The payload is shared: re-emitting an event's payload keeps the same
/// `Arc`, which is how the checkpoint processor recognizes the first channel
/// hop of a caller-supplied event.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNode {
    pub payload: Arc<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
    /// Absolute path of the node whose contract emitted this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_node_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    /// Absolute path the router should start from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// The event that started this causal chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_event: Option<Arc<EventNode>>,
    /// Hops taken so far, each `"<absolutePath>#<contractName>"`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl EventNode {
    pub fn new(payload: Value) -> Self {
        Self::from_shared(Arc::new(payload))
    }

    /// Wraps an already shared payload without copying it.
    pub fn from_shared(payload: Arc<Value>) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn external(payload: Value) -> Self {
        Self::new(payload).with_source(EventSource::External)
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_channel_name(mut self, channel_name: impl Into<String>) -> Self {
        self.channel_name = Some(channel_name.into());
        self
    }

    pub fn with_dispatch_path(mut self, dispatch_path: impl Into<String>) -> Self {
        self.dispatch_path = Some(dispatch_path.into());
        self
    }

    pub fn with_origin_node_path(mut self, origin_node_path: impl Into<String>) -> Self {
        self.origin_node_path = Some(origin_node_path.into());
        self
    }

    /// The payload's `type` discriminator, if it is a string.
    pub fn event_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    pub fn is_channel(&self) -> bool {
        self.source == Some(EventSource::Channel)
    }

    /// True when both events carry the very same payload allocation.
    pub fn shares_payload_with(&self, other: &EventNode) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    /// Copy of this event with one more trace hop appended.
    pub fn with_hop(&self, node_path: &str, contract_name: &str) -> Self {
        let mut next = self.clone();
        next.trace.push(format!("{node_path}#{contract_name}"));
        next
    }
}

/// What a contract asked for during `handle()`, released by `flush()`.
#[derive(Debug, Clone)]
pub enum ProcessingAction {
    Patch(Patch),
    Event(EventNode),
}

impl ProcessingAction {
    pub fn is_patch(&self) -> bool {
        matches!(self, Self::Patch(_))
    }
}

/// `Document Update` payload describing `patch`.
pub fn document_update_event(patch: &Patch) -> Value {
    let mut payload = json!({ "type": DOCUMENT_UPDATE });
    if let (Value::Object(out), Ok(Value::Object(fields))) = (&mut payload, serde_json::to_value(patch)) {
        out.extend(fields);
    }
    payload
}

/// `Timeline Entry` payload posted to `timeline_id`.
pub fn timeline_entry_event(timeline_id: &str, message: Value) -> Value {
    json!({
        "type": TIMELINE_ENTRY,
        "timeline": { "timelineId": timeline_id },
        "message": message,
    })
}

pub fn document_processing_initiated_event(document_id: &str) -> Value {
    json!({ "type": DOCUMENT_PROCESSING_INITIATED, "documentId": document_id })
}
