use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{accepts, emit_on_channel};
use crate::constants::{TIMELINE_CHANNEL, TIMELINE_ENTRY};
use crate::context::ProcessingContext;
use crate::event::EventNode;
use crate::registry::{ContractProcessor, ContractRole};

/// `Timeline Channel`: matches `Timeline Entry` events posted to the
/// channel's `timelineId`.
pub struct TimelineChannelProcessor;

#[async_trait]
impl ContractProcessor for TimelineChannelProcessor {
    fn contract_type(&self) -> &str {
        TIMELINE_CHANNEL
    }

    fn contract_blue_id(&self) -> &str {
        TIMELINE_CHANNEL
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        if !accepts(event) || event.event_type() != Some(TIMELINE_ENTRY) {
            return false;
        }
        let entry_timeline = event.payload.pointer("/timeline/timelineId");
        let channel_timeline = contract.get("timelineId");
        matches!((entry_timeline, channel_timeline), (Some(a), Some(b)) if !a.is_null() && a == b)
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
