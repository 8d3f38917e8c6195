use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{accepts, emit_on_channel};
use crate::constants::EMBEDDED_NODE_CHANNEL;
use crate::context::ProcessingContext;
use crate::event::EventNode;
use crate::path::normalize;
use crate::registry::{ContractProcessor, ContractRole};

/// `Embedded Node Channel`: surfaces events emitted by contracts of the node
/// at the channel's `path` (typically an embedded document).
pub struct EmbeddedNodeChannelProcessor;

#[async_trait]
impl ContractProcessor for EmbeddedNodeChannelProcessor {
    fn contract_type(&self) -> &str {
        EMBEDDED_NODE_CHANNEL
    }

    fn contract_blue_id(&self) -> &str {
        EMBEDDED_NODE_CHANNEL
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(&self, event: &EventNode, contract: &Value, ctx: &ProcessingContext, _: &str) -> bool {
        if !accepts(event) {
            return false;
        }
        match (
            event.origin_node_path.as_deref(),
            contract.get("path").and_then(Value::as_str),
        ) {
            (Some(origin), Some(path)) => normalize(origin) == ctx.resolve_path(path),
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
