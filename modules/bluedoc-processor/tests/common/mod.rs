//! Shared fixtures for integration tests: a counting hasher and a small
//! vocabulary of test contract processors.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use bluedoc_processor::{
    Blue, BlueDocumentProcessor, ContractProcessor, ContractRole, EventNode, EventSource, Patch,
    ProcessingContext, ProcessorConfig,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Hasher: blue-1, blue-2, ...
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingBlue {
    calls: AtomicUsize,
}

impl CountingBlue {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Blue for CountingBlue {
    async fn calculate_blue_id(&self, _value: &Value) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("blue-{n}"))
    }
}

// ---------------------------------------------------------------------------
// Test contract processors
// ---------------------------------------------------------------------------

/// True for channel events on the channel named by the contract's `channel`.
fn on_channel(event: &EventNode, contract: &Value) -> bool {
    event.is_channel()
        && event.channel_name.as_deref() == contract.get("channel").and_then(Value::as_str)
}

/// Adapter: re-emits events of `eventType` (default `Test Event`) on itself.
pub struct TestEventChannel;

#[async_trait]
impl ContractProcessor for TestEventChannel {
    fn contract_type(&self) -> &str {
        "Test Event Channel"
    }
    fn contract_blue_id(&self) -> &str {
        "test-event-channel"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }
    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        let wanted = contract
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or("Test Event");
        !event.is_channel() && event.event_type() == Some(wanted)
    }
    async fn handle(
        &self,
        event: &EventNode,
        _: &Value,
        ctx: &mut ProcessingContext,
        name: &str,
    ) -> Result<()> {
        ctx.emit_event(
            EventNode::from_shared(Arc::clone(&event.payload))
                .with_source(EventSource::Channel)
                .with_channel_name(name),
        );
        Ok(())
    }
}

/// Handler: applies the contract's `patch` (one patch or a list).
pub struct ApplyPatch;

#[async_trait]
impl ContractProcessor for ApplyPatch {
    fn contract_type(&self) -> &str {
        "Apply Patch"
    }
    fn contract_blue_id(&self) -> &str {
        "apply-patch"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }
    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        on_channel(event, contract)
    }
    async fn handle(
        &self,
        _: &EventNode,
        contract: &Value,
        ctx: &mut ProcessingContext,
        _: &str,
    ) -> Result<()> {
        let patches: Vec<Patch> = match contract.get("patch") {
            Some(Value::Array(items)) => serde_json::from_value(Value::Array(items.clone()))?,
            Some(single) => vec![serde_json::from_value(single.clone())?],
            None => bail!("contract has no patch"),
        };
        for patch in patches {
            ctx.add_patch(patch);
        }
        Ok(())
    }
}

pub type RecordLog = Arc<Mutex<Vec<(String, i64)>>>;

/// Handler: records `(contract name, counter)` and increments `/counter`.
pub struct RecordingHandler {
    log: RecordLog,
}

#[async_trait]
impl ContractProcessor for RecordingHandler {
    fn contract_type(&self) -> &str {
        "Recording Handler"
    }
    fn contract_blue_id(&self) -> &str {
        "recording-handler"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }
    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        on_channel(event, contract)
    }
    async fn handle(
        &self,
        _: &EventNode,
        _: &Value,
        ctx: &mut ProcessingContext,
        name: &str,
    ) -> Result<()> {
        let counter = ctx.get("/counter").and_then(Value::as_i64).unwrap_or(0);
        self.log.lock().unwrap().push((name.to_string(), counter));
        ctx.add_patch(Patch::replace("/counter", json!(counter + 1)));
        Ok(())
    }
}

/// Handler: emits the contract's `event` payload.
pub struct EmitEvent;

#[async_trait]
impl ContractProcessor for EmitEvent {
    fn contract_type(&self) -> &str {
        "Emit Event"
    }
    fn contract_blue_id(&self) -> &str {
        "emit-event"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }
    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        on_channel(event, contract)
    }
    async fn handle(
        &self,
        _: &EventNode,
        contract: &Value,
        ctx: &mut ProcessingContext,
        _: &str,
    ) -> Result<()> {
        let payload = contract.get("event").cloned().unwrap_or(Value::Null);
        ctx.emit_event(EventNode::new(payload));
        Ok(())
    }
}

/// Adapter that illegally patches the document.
pub struct PatchingAdapter;

#[async_trait]
impl ContractProcessor for PatchingAdapter {
    fn contract_type(&self) -> &str {
        "Patching Adapter"
    }
    fn contract_blue_id(&self) -> &str {
        "patching-adapter"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }
    fn supports(&self, event: &EventNode, _: &Value, _: &ProcessingContext, _: &str) -> bool {
        !event.is_channel()
    }
    async fn handle(
        &self,
        _: &EventNode,
        _: &Value,
        ctx: &mut ProcessingContext,
        _: &str,
    ) -> Result<()> {
        ctx.add_patch(Patch::add("/tampered", json!(true)));
        Ok(())
    }
}

/// Adapter answering every `Echo` with another `Echo`.
pub struct EchoAdapter;

#[async_trait]
impl ContractProcessor for EchoAdapter {
    fn contract_type(&self) -> &str {
        "Echo Adapter"
    }
    fn contract_blue_id(&self) -> &str {
        "echo-adapter"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Adapter
    }
    fn supports(&self, event: &EventNode, _: &Value, _: &ProcessingContext, _: &str) -> bool {
        event.event_type() == Some("Echo")
    }
    async fn handle(
        &self,
        _: &EventNode,
        _: &Value,
        ctx: &mut ProcessingContext,
        _: &str,
    ) -> Result<()> {
        ctx.emit_event(EventNode::new(json!({ "type": "Echo" })));
        Ok(())
    }
}

pub struct FailingHandler;

#[async_trait]
impl ContractProcessor for FailingHandler {
    fn contract_type(&self) -> &str {
        "Failing Handler"
    }
    fn contract_blue_id(&self) -> &str {
        "failing-handler"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Handler
    }
    fn supports(&self, event: &EventNode, contract: &Value, _: &ProcessingContext, _: &str) -> bool {
        on_channel(event, contract)
    }
    async fn handle(
        &self,
        _: &EventNode,
        _: &Value,
        _: &mut ProcessingContext,
        name: &str,
    ) -> Result<()> {
        bail!("{name} refused the event")
    }
}

/// Marker whose `init` asks for a `Test Event` at its node on every batch.
pub struct StartupEmitter;

#[async_trait]
impl ContractProcessor for StartupEmitter {
    fn contract_type(&self) -> &str {
        "Startup Emitter"
    }
    fn contract_blue_id(&self) -> &str {
        "startup-emitter"
    }
    fn role(&self) -> ContractRole {
        ContractRole::Marker
    }
    fn supports(&self, _: &EventNode, _: &Value, _: &ProcessingContext, _: &str) -> bool {
        false
    }
    async fn handle(
        &self,
        _: &EventNode,
        _: &Value,
        _: &mut ProcessingContext,
        _: &str,
    ) -> Result<()> {
        Ok(())
    }
    fn init(&self, _: &Value, _: &str, name: &str) -> Vec<EventNode> {
        vec![EventNode::new(json!({ "type": "Test Event", "startedBy": name }))]
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub processor: BlueDocumentProcessor,
    pub log: RecordLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Arc::new(CountingBlue::default()), ProcessorConfig::default())
    }

    pub fn with_blue(blue: Arc<dyn Blue>) -> Self {
        Self::with(blue, ProcessorConfig::default())
    }

    pub fn with_config(config: ProcessorConfig) -> Self {
        Self::with(Arc::new(CountingBlue::default()), config)
    }

    pub fn with(blue: Arc<dyn Blue>, config: ProcessorConfig) -> Self {
        let log = RecordLog::default();
        let mut processor = BlueDocumentProcessor::new(blue, config).unwrap();

        let test_processors: Vec<Arc<dyn ContractProcessor>> = vec![
            Arc::new(TestEventChannel),
            Arc::new(ApplyPatch),
            Arc::new(RecordingHandler { log: Arc::clone(&log) }),
            Arc::new(EmitEvent),
            Arc::new(PatchingAdapter),
            Arc::new(EchoAdapter),
            Arc::new(FailingHandler),
            Arc::new(StartupEmitter),
        ];
        for test_processor in test_processors {
            processor.register(test_processor, None).unwrap();
        }

        Self { processor, log }
    }

    pub fn recorded(&self) -> Vec<(String, i64)> {
        self.log.lock().unwrap().clone()
    }
}

pub fn recorded(name: &str, counter: i64) -> (String, i64) {
    (name.to_string(), counter)
}
