//! Contract-driven document processor.
//!
//! Routes events through contracts attached anywhere in a document tree:
//! route → schedule → drain → commit, until the task queue settles. Every
//! batch either commits as a whole or leaves the caller's snapshot untouched.
//!
//! Consumers extend the vocabulary by implementing `ContractProcessor`
//! (adapters translate events inline, handlers patch state from the queue)
//! and supply a `Blue` collaborator for content hashing.

pub mod blue;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod context;
pub mod document;
pub mod error;
pub mod event;
pub mod patch;
pub mod path;
pub mod processor;
pub mod processors;
pub mod queue;
pub mod registry;
pub mod router;

pub use blue::{Blue, Sha256Blue};
pub use checkpoint::{ensure_checkpoint_contracts, ChannelEventCheckpointProcessor, CheckpointCache};
pub use config::{load_config, ProcessorConfig};
pub use context::ProcessingContext;
pub use document::{collect_embedded_paths, deep_contains, Document, EmbeddedSpec, TypeRef};
pub use error::{PatchError, ProcessorError, ProcessorResult};
pub use event::{
    document_processing_initiated_event, document_update_event, timeline_entry_event, EventNode,
    EventSource, ProcessingAction,
};
pub use patch::{apply_patches, Patch};
pub use processor::{BlueDocumentProcessor, ProcessingResult};
pub use processors::default_processors;
pub use queue::{compare_tasks, make_task_key, Task, TaskKey, TaskQueue};
pub use registry::{ContractProcessor, ContractRegistry, ContractRole};
pub use router::{EventRouter, RoutingSession};
