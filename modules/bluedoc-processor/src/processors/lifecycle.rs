use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{accepts, emit_on_channel};
use crate::constants::{LIFECYCLE_EVENT_CHANNEL, LIFECYCLE_EVENT_TYPES};
use crate::context::ProcessingContext;
use crate::document::deep_contains;
use crate::event::EventNode;
use crate::registry::{ContractProcessor, ContractRole};

/// `Lifecycle Event Channel`: surfaces engine lifecycle events, optionally
/// narrowed by an `event` pattern that must be contained in the payload.
///
/// ```json
/// { "type": "Lifecycle Event Channel", "event": { "type": "Document Processing Initiated" } }
/// ```
pub struct LifecycleEventChannelProcessor;

#[async_trait]
impl ContractProcessor for LifecycleEventChannelProcessor {
    fn contract_type(&self) -> &str {
        LIFECYCLE_EVENT_CHANNEL
    }

    fn contract_blue_id(&self) -> &str {
        LIFECYCLE_EVENT_CHANNEL
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        let is_lifecycle = event
            .event_type()
            .is_some_and(|t| LIFECYCLE_EVENT_TYPES.contains(&t));
        if !accepts(event) || !is_lifecycle {
            return false;
        }
        match contract.get("event") {
            None | Some(Value::Null) => true,
            Some(pattern) => deep_contains(&event.payload, pattern),
        }
    }

    async fn handle(
        &self,
        event: &EventNode,
        _contract: &Value,
        ctx: &mut ProcessingContext,
        contract_name: &str,
    ) -> Result<()> {
        emit_on_channel(ctx, event, contract_name);
        Ok(())
    }
}
