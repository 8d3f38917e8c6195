use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::constants::PROCESS_EMBEDDED;
use crate::context::ProcessingContext;
use crate::event::{EventNode, EventSource};
use crate::registry::{ContractProcessor, ContractRole};

/// `Process Embedded`: claims the sub-documents listed in `paths` and
/// forwards external events arriving at its node into each of them.
///
/// Forwarded events keep the caller's payload and root event, which is what
/// lets them pass the embedded routing lock that rejects direct dispatch.
pub struct ProcessEmbeddedProcessor;

fn embedded_paths(contract: &Value) -> impl Iterator<Item = &str> {
    contract
        .get("paths")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

#[async_trait]
impl ContractProcessor for ProcessEmbeddedProcessor {
    fn contract_type(&self) -> &str {
        PROCESS_EMBEDDED
    }

    fn contract_blue_id(&self) -> &str {
        PROCESS_EMBEDDED
    }

    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }

    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        event.source == Some(EventSource::External) && embedded_paths(contract).next().is_some()
    }

    async fn handle(
        &self,
        event: &EventNode,
        contract: &Value,
        ctx: &mut ProcessingContext,
        _contract_name: &str,
    ) -> Result<()> {
        for path in embedded_paths(contract) {
            let target = ctx.resolve_path(path);
            ctx.emit_event(
                EventNode::from_shared(Arc::clone(&event.payload))
                    .with_source(EventSource::External)
                    .with_dispatch_path(target),
            );
        }
        Ok(())
    }
}
