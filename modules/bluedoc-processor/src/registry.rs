//! Contract processors and the registry that maps contract types to them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::context::ProcessingContext;
use crate::document::TypeRef;
use crate::error::{ProcessorError, ProcessorResult};
use crate::event::EventNode;

/// How the router dispatches a matched contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRole {
    /// Translates events inline; may emit events, never patches.
    Adapter,
    /// Declared but never dispatched by the router.
    Validator,
    /// Scheduled on the task queue; may patch and emit.
    Handler,
    /// Inert state carrier (checkpoints, initialization markers).
    Marker,
}

/// Understands one contract type.
///
/// `supports` must be a pure predicate over the event, the contract node and
/// the snapshot visible through `ctx`; the driver calls it again right before
/// executing a queued handler because state may have moved since routing.
#[async_trait]
pub trait ContractProcessor: Send + Sync {
    /// Catalogue name of the contract type.
    fn contract_type(&self) -> &str;

    /// Blue id of the contract type; unique within a registry.
    fn contract_blue_id(&self) -> &str;

    fn role(&self) -> ContractRole;

    fn supports(
        &self,
        event: &EventNode,
        contract: &Value,
        ctx: &ProcessingContext,
        contract_name: &str,
    ) -> bool;

    async fn handle(
        &self,
        event: &EventNode,
        contract: &Value,
        ctx: &mut ProcessingContext,
        contract_name: &str,
    ) -> Result<()>;

    /// Bootstrap events routed at the start of every batch.
    fn init(&self, _contract: &Value, _node_path: &str, _contract_name: &str) -> Vec<EventNode> {
        Vec::new()
    }
}

struct Registered {
    processor: Arc<dyn ContractProcessor>,
    priority: i64,
}

/// Static lookup from contract type to processor, plus registration priority.
#[derive(Default)]
pub struct ContractRegistry {
    entries: Vec<Registered>,
    by_blue_id: HashMap<String, usize>,
    by_type: HashMap<String, usize>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `processor`; its priority is `order_hint` or the registration
    /// index. Fails if a processor with the same blue id already exists.
    pub fn register(
        &mut self,
        processor: Arc<dyn ContractProcessor>,
        order_hint: Option<i64>,
    ) -> ProcessorResult<()> {
        let blue_id = processor.contract_blue_id().to_string();
        if self.by_blue_id.contains_key(&blue_id) {
            return Err(ProcessorError::DuplicateProcessor { blue_id });
        }

        let index = self.entries.len();
        let priority = order_hint.unwrap_or(index as i64);
        self.by_blue_id.insert(blue_id, index);
        self.by_type
            .entry(processor.contract_type().to_string())
            .or_insert(index);
        self.entries.push(Registered {
            processor,
            priority,
        });
        Ok(())
    }

    /// Processor for a contract's type, matched by blue id first, then by name.
    pub fn get(&self, type_ref: &TypeRef<'_>) -> Option<Arc<dyn ContractProcessor>> {
        self.index_of(type_ref)
            .map(|index| Arc::clone(&self.entries[index].processor))
    }

    /// Registration priority of a contract's type; 0 when unregistered.
    pub fn order_of(&self, type_ref: &TypeRef<'_>) -> i64 {
        self.index_of(type_ref)
            .map_or(0, |index| self.entries[index].priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered processors in registration order.
    pub fn processors(&self) -> impl Iterator<Item = &Arc<dyn ContractProcessor>> {
        self.entries.iter().map(|entry| &entry.processor)
    }

    fn index_of(&self, type_ref: &TypeRef<'_>) -> Option<usize> {
        type_ref
            .blue_id
            .and_then(|id| self.by_blue_id.get(id))
            .or_else(|| type_ref.name.and_then(|name| self.by_type.get(name)))
            .copied()
    }
}
