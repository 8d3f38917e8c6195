//! Built-in contract processors.
//!
//! Channels are adapters: they recognize an incoming event and re-emit its
//! payload as a channel event named after the contract, local to the node
//! that declares it. Handlers subscribe to those channel events.

mod document_update;
mod embedded_node;
mod lifecycle;
mod marker;
mod process_embedded;
mod timeline;

use std::sync::Arc;

use crate::constants::INITIALIZED_MARKER;
use crate::context::ProcessingContext;
use crate::event::{EventNode, EventSource};
use crate::registry::ContractProcessor;

pub use document_update::DocumentUpdateChannelProcessor;
pub use embedded_node::EmbeddedNodeChannelProcessor;
pub use lifecycle::LifecycleEventChannelProcessor;
pub use marker::MarkerProcessor;
pub use process_embedded::ProcessEmbeddedProcessor;
pub use timeline::TimelineChannelProcessor;

/// Processors every driver registers, in registration order.
pub fn default_processors() -> Vec<Arc<dyn ContractProcessor>> {
    vec![
        Arc::new(DocumentUpdateChannelProcessor),
        Arc::new(EmbeddedNodeChannelProcessor),
        Arc::new(LifecycleEventChannelProcessor),
        Arc::new(TimelineChannelProcessor),
        Arc::new(ProcessEmbeddedProcessor),
        Arc::new(MarkerProcessor::new(INITIALIZED_MARKER)),
    ]
}

/// Channels never consume channel events; that would let one channel's
/// output feed another channel on the same node.
fn accepts(event: &EventNode) -> bool {
    !event.is_channel()
}

/// Re-emits `event`'s payload, unchanged and shared, on channel `contract_name`.
fn emit_on_channel(ctx: &mut ProcessingContext, event: &EventNode, contract_name: &str) {
    ctx.emit_event(
        EventNode::from_shared(Arc::clone(&event.payload))
            .with_source(EventSource::Channel)
            .with_channel_name(contract_name),
    );
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_processors_have_unique_blue_ids() {
        let processors = default_processors();
        let ids: HashSet<_> = processors.iter().map(|p| p.contract_blue_id().to_string()).collect();
        assert_eq!(ids.len(), processors.len());
    }
}
