use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::context::ProcessingContext;
use crate::event::EventNode;
use crate::registry::{ContractProcessor, ContractRole};

/// Registers an inert contract type (such as `Initialized Marker`) so the
/// router recognizes it instead of warning about an unknown type.
pub struct MarkerProcessor {
    type_name: &'static str,
}

impl MarkerProcessor {
    pub fn new(type_name: &'static str) -> Self {
        Self { type_name }
    }
}

#[async_trait]
impl ContractProcessor for MarkerProcessor {
    fn contract_type(&self) -> &str {
        self.type_name
    }

    fn contract_blue_id(&self) -> &str {
        self.type_name
    }

    fn role(&self) -> ContractRole {
        ContractRole::Marker
    }

    fn supports(&self, _: &EventNode, _: &Value, _: &ProcessingContext, _: &str) -> bool {
        false
    }

    async fn handle(&self, _: &EventNode, _: &Value, _: &mut ProcessingContext, _: &str) -> Result<()> {
        Ok(())
    }
}
