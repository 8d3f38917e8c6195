//! Typed errors for routing, scheduling and commit.
//!
//! Every variant is fatal to the batch that raised it: the driver returns it
//! to the caller and discards all work done since the batch began. Routing
//! warnings (unregistered contract types) are logged, not raised.

use thiserror::Error;

use crate::patch::Patch;

/// Errors that abort a processing batch.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// An adapter buffered a patch; adapters may only translate events.
    #[error("adapter contract '{contract}' at {node_path} attempted to patch the document")]
    AdapterPatch { contract: String, node_path: String },

    /// Inline adapter dispatch nested deeper than the configured limit.
    #[error("adapter recursion limit of {limit} exceeded at contract '{contract}' ({node_path})")]
    InlineDepthExceeded {
        contract: String,
        node_path: String,
        limit: usize,
    },

    /// A caller-supplied event tried to enter an embedded document directly.
    #[error(
        "event dispatched to {target} reaches inside embedded document {embedded_path} \
         (Process Embedded @ {contract_path})"
    )]
    EmbeddedRouting {
        target: String,
        embedded_path: String,
        contract_path: String,
    },

    /// A handler outside an embedded document patched its interior.
    #[error("patch {patch} from {writer_path} touches embedded document {embedded_path}")]
    EmbeddedDocumentModification {
        patch: Patch,
        embedded_path: String,
        writer_path: String,
    },

    /// A patch could not be applied to the current snapshot.
    #[error("cannot apply patch {patch}")]
    PatchApplication {
        patch: Patch,
        #[source]
        source: PatchError,
    },

    /// A contract processor's hook failed.
    #[error("contract '{contract}' at {node_path} failed")]
    Handler {
        contract: String,
        node_path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The drain executed more tasks than allowed; reactions are likely cyclic.
    #[error("possible cycle: more than {limit} tasks executed in one drain")]
    CycleSuspected { limit: usize },

    /// A processor for the same contract type is already registered.
    #[error("a processor for contract type '{blue_id}' is already registered")]
    DuplicateProcessor { blue_id: String },

    /// The hashing collaborator failed.
    #[error("failed to calculate blue id")]
    Hashing(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pointer and target failures while applying a single patch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("path {path} does not exist")]
    PathNotFound { path: String },

    #[error("segment '{segment}' of {path} does not address a container")]
    NotAContainer { path: String, segment: String },

    #[error("invalid array index '{index}' in {path}")]
    InvalidIndex { path: String, index: String },

    #[error("the document root cannot be removed")]
    RemoveRoot,

    #[error("cannot move {from} into its own descendant {path}")]
    MoveIntoSelf { from: String, path: String },
}

/// Result type alias for processor operations.
pub type ProcessorResult<T> = std::result::Result<T, ProcessorError>;
