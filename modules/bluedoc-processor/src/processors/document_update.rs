use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{accepts, emit_on_channel};
use crate::constants::{DOCUMENT_UPDATE, DOCUMENT_UPDATE_CHANNEL};
use crate::context::ProcessingContext;
use crate::event::EventNode;
use crate::path::normalize;
use crate::registry::{ContractProcessor, ContractRole};

/// `Document Update Channel`: matches `Document Update` events whose `path`
/// equals the channel's `path`, resolved against the channel's node.
pub struct DocumentUpdateChannelProcessor;

#[async_trait]
impl ContractProcessor for DocumentUpdateChannelProcessor {
    fn contract_type(&self) -> &str {
        DOCUMENT_UPDATE_CHANNEL
    }

    fn contract_blue_id(&self) -> &str {
        DOCUMENT_UPDATE_CHANNEL
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(&self, event: &EventNode, contract: &Value, ctx: &ProcessingContext, _: &str) -> bool {
        if !accepts(event) || event.event_type() != Some(DOCUMENT_UPDATE) {
            return false;
        }
        let updated = event.payload.get("path").and_then(Value::as_str);
        let watched = contract.get("path").and_then(Value::as_str);
        match (updated, watched) {
            (Some(updated), Some(watched)) => normalize(updated) == ctx.resolve_path(watched),
            _ => false,
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
