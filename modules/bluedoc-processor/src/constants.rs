//! Well-known contract and event types.
//!
//! The type catalogue itself is external; built-in processors use the type
//! name as their blue id so documents may reference either form.

pub const CONTRACTS_KEY: &str = "contracts";

pub const CHECKPOINT_CONTRACT_NAME: &str = "checkpoint";
pub const INITIALIZED_CONTRACT_NAME: &str = "initialized";

pub const CHANNEL_EVENT_CHECKPOINT: &str = "Channel Event Checkpoint";
pub const PROCESS_EMBEDDED: &str = "Process Embedded";
pub const INITIALIZED_MARKER: &str = "Initialized Marker";

pub const DOCUMENT_UPDATE_CHANNEL: &str = "Document Update Channel";
pub const EMBEDDED_NODE_CHANNEL: &str = "Embedded Node Channel";
pub const LIFECYCLE_EVENT_CHANNEL: &str = "Lifecycle Event Channel";
pub const TIMELINE_CHANNEL: &str = "Timeline Channel";

pub const DOCUMENT_UPDATE: &str = "Document Update";
pub const TIMELINE_ENTRY: &str = "Timeline Entry";
pub const DOCUMENT_PROCESSING_INITIATED: &str = "Document Processing Initiated";

/// Lifecycle event types surfaced by `Lifecycle Event Channel`.
pub const LIFECYCLE_EVENT_TYPES: &[&str] = &[DOCUMENT_PROCESSING_INITIATED];

/// Default registration priority of the checkpoint processor, so bookkeeping
/// runs after ordinary handlers reacting to the same event.
pub const CHECKPOINT_ORDER_HINT: i64 = 9999;

/// Maximum nesting of inline adapter dispatch.
pub const MAX_INLINE_DEPTH: usize = 64;

/// Maximum tasks executed by one drain before the batch is treated as a cycle.
pub const MAX_DRAIN_STEPS: usize = 10_000;
