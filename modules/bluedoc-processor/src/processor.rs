//! The batch driver.
//!
//! ensure checkpoints → bootstrap → (route → drain → checkpoint) per event.
//! Every batch starts from the caller's snapshot and either returns a new
//! snapshot or an error; the caller's document is never touched.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, trace, warn};

use crate::blue::Blue;
use crate::checkpoint::{ensure_checkpoint_contracts, ChannelEventCheckpointProcessor, CheckpointCache};
use crate::config::ProcessorConfig;
use crate::constants::{CONTRACTS_KEY, INITIALIZED_CONTRACT_NAME, INITIALIZED_MARKER};
use crate::context::ProcessingContext;
use crate::document::{collect_embedded_paths, Document, TypeRef};
use crate::error::{ProcessorError, ProcessorResult};
use crate::event::{document_processing_initiated_event, EventNode, EventSource, ProcessingAction};
use crate::patch::{apply_patches, Patch};
use crate::path::{escape_segment, is_inside, make_path, split_path};
use crate::processors::default_processors;
use crate::registry::{ContractProcessor, ContractRegistry};
use crate::router::{EventRouter, RoutingSession};

/// Outcome of a committed batch.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub state: Document,
    /// Bootstrap and lifecycle events, then every event flushed by a handler,
    /// in emission order. Each carries the `seq` it was routed with.
    pub emitted: Vec<EventNode>,
}

pub struct BlueDocumentProcessor {
    blue: Arc<dyn Blue>,
    config: ProcessorConfig,
    registry: ContractRegistry,
    checkpoint_cache: Arc<CheckpointCache>,
}

impl BlueDocumentProcessor {
    /// Creates a processor with the built-in contract processors and the
    /// checkpoint processor registered.
    pub fn new(blue: Arc<dyn Blue>, config: ProcessorConfig) -> ProcessorResult<Self> {
        let mut registry = ContractRegistry::new();
        for processor in default_processors() {
            registry.register(processor, None)?;
        }

        let checkpoint_cache = Arc::new(CheckpointCache::new());
        registry.register(
            Arc::new(ChannelEventCheckpointProcessor::new(Arc::clone(&checkpoint_cache))),
            Some(config.checkpoint_order_hint),
        )?;

        Ok(Self {
            blue,
            config,
            registry,
            checkpoint_cache,
        })
    }

    pub fn register(
        &mut self,
        processor: Arc<dyn ContractProcessor>,
        order_hint: Option<i64>,
    ) -> ProcessorResult<()> {
        self.registry.register(processor, order_hint)
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Processes caller-supplied events as one all-or-nothing batch.
    pub async fn process_events(
        &mut self,
        document: &Document,
        events: Vec<EventNode>,
    ) -> ProcessorResult<ProcessingResult> {
        let started = Instant::now();
        let incoming = events.len();

        self.checkpoint_cache.clear();
        let result = self.run_batch(document, events).await;
        self.checkpoint_cache.clear();

        match &result {
            Ok(outcome) => info!(
                events = incoming,
                emitted = outcome.emitted.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Batch committed"
            ),
            Err(e) => warn!(events = incoming, error = %e, "Batch rolled back"),
        }
        result
    }

    /// [`process_events`](Self::process_events) over bare payloads.
    pub async fn process_payloads(
        &mut self,
        document: &Document,
        payloads: Vec<Value>,
    ) -> ProcessorResult<ProcessingResult> {
        let events = payloads.into_iter().map(EventNode::external).collect();
        self.process_events(document, events).await
    }

    /// Announces `Document Processing Initiated` to the root and every
    /// embedded document (deepest first), drains the reactions, then marks
    /// the root as initialized. Already initialized documents are returned
    /// unchanged.
    pub async fn initialize(&mut self, document: &Document) -> ProcessorResult<ProcessingResult> {
        if is_initialized(document) {
            debug!("document already initialized");
            return Ok(ProcessingResult {
                state: document.clone(),
                emitted: Vec::new(),
            });
        }

        self.checkpoint_cache.clear();
        let result = self.run_initialize(document).await;
        self.checkpoint_cache.clear();

        match &result {
            Ok(outcome) => info!(emitted = outcome.emitted.len(), "Document initialized"),
            Err(e) => warn!(error = %e, "Initialization rolled back"),
        }
        result
    }

    pub fn is_initialized(&self, document: &Document) -> bool {
        is_initialized(document)
    }

    async fn run_batch(&self, document: &Document, events: Vec<EventNode>) -> ProcessorResult<ProcessingResult> {
        let router = EventRouter::new(&self.registry, Arc::clone(&self.blue), &self.config);
        let mut session = RoutingSession::new();
        let mut emitted = Vec::new();
        let mut current = ensure_checkpoint_contracts(document)?;

        for mut event in self.bootstrap_events(&current) {
            session.assign_seq(&mut event);
            emitted.push(event.clone());
            router.route(&mut session, &current, Vec::new(), event, 0, 0).await?;
        }
        current = self.drain(&router, &mut session, current, &mut emitted).await?;

        for event in events {
            let event = event.with_source(EventSource::External);
            router.route(&mut session, &current, Vec::new(), event, 0, 0).await?;
            current = self.drain(&router, &mut session, current, &mut emitted).await?;
            current = self.flush_checkpoints(current)?;
        }

        Ok(ProcessingResult { state: current, emitted })
    }

    async fn run_initialize(&self, document: &Document) -> ProcessorResult<ProcessingResult> {
        let router = EventRouter::new(&self.registry, Arc::clone(&self.blue), &self.config);
        let mut session = RoutingSession::new();
        let mut emitted = Vec::new();

        let mut bases: Vec<String> = collect_embedded_paths(document.as_value())
            .into_iter()
            .map(|spec| spec.abs_path)
            .filter(|path| document.node(path).is_some())
            .collect();
        bases.sort_by(|a, b| split_path(b).len().cmp(&split_path(a).len()).then_with(|| a.cmp(b)));
        bases.dedup();
        bases.push("/".to_string());

        let mut announcements = Vec::with_capacity(bases.len());
        for base in &bases {
            let subtree = document.get(base).cloned().unwrap_or(Value::Null);
            announcements.push((base.clone(), self.blue_id(&subtree).await?));
        }

        let mut current = ensure_checkpoint_contracts(document)?;
        for (base, document_id) in &announcements {
            let mut event = EventNode::new(document_processing_initiated_event(document_id))
                .with_source(EventSource::Internal)
                .with_dispatch_path(base.clone());
            session.assign_seq(&mut event);
            emitted.push(event.clone());
            router.route(&mut session, &current, Vec::new(), event, 0, 0).await?;
            current = self.drain(&router, &mut session, current, &mut emitted).await?;
        }

        let root_id = announcements
            .last()
            .map(|(_, id)| id.clone())
            .unwrap_or_default();
        let marker = Patch::add(
            format!("/{CONTRACTS_KEY}/{INITIALIZED_CONTRACT_NAME}"),
            json!({ "type": INITIALIZED_MARKER, "documentId": root_id }),
        );
        current = apply_patches(&current, &[marker])?;

        Ok(ProcessingResult { state: current, emitted })
    }

    /// Executes queued tasks in key order until the queue is empty.
    async fn drain(
        &self,
        router: &EventRouter<'_>,
        session: &mut RoutingSession,
        mut current: Document,
        emitted: &mut Vec<EventNode>,
    ) -> ProcessorResult<Document> {
        let mut steps = 0usize;

        while let Some(task) = session.pop_task() {
            steps += 1;
            if steps > self.config.max_drain_steps {
                return Err(ProcessorError::CycleSuspected {
                    limit: self.config.max_drain_steps,
                });
            }

            // State may have moved since the task was scheduled.
            let Some(contract) = current.contract(&task.node_path, &task.contract_name).cloned() else {
                debug!(
                    contract = %task.contract_name,
                    node_path = %task.node_path,
                    scheduled = %task.contract_node,
                    "contract gone, skipping task"
                );
                continue;
            };
            let Some(processor) = TypeRef::of(&contract).and_then(|t| self.registry.get(&t)) else {
                warn!(contract = %task.contract_name, node_path = %task.node_path, "No processor registered for contract");
                continue;
            };

            let mut ctx = ProcessingContext::new(
                current.clone(),
                task.node_path.clone(),
                task.contract_name.clone(),
                task.event.clone(),
                Arc::clone(&self.blue),
            );
            if !processor.supports(&task.event, &contract, &ctx, &task.contract_name) {
                trace!(contract = %task.contract_name, node_path = %task.node_path, "task no longer supported");
                continue;
            }

            debug!(
                contract = %task.contract_name,
                node_path = %task.node_path,
                task_id = task.key.task_id,
                "executing task"
            );
            processor
                .handle(&task.event, &contract, &mut ctx, &task.contract_name)
                .await
                .map_err(|source| ProcessorError::Handler {
                    contract: task.contract_name.clone(),
                    node_path: task.node_path.clone(),
                    source: source.into(),
                })?;

            for action in ctx.flush() {
                match action {
                    ProcessingAction::Patch(patch) => {
                        guard_embedded_write(&current, &patch, &task.node_path)?;
                        current = match apply_patches(&current, std::slice::from_ref(&patch)) {
                            Ok(next) => next,
                            Err(e) => {
                                error!(
                                    contract = %task.contract_name,
                                    event = %task.event.payload,
                                    error = %e,
                                    "Failed to apply patch"
                                );
                                return Err(e);
                            }
                        };
                    }
                    ProcessingAction::Event(mut event) => {
                        session.assign_seq(&mut event);
                        emitted.push(event.clone());
                        let after = session.max_task_id();
                        router.route(session, &current, Vec::new(), event, after, 0).await?;
                    }
                }
            }
        }

        Ok(current)
    }

    fn flush_checkpoints(&self, current: Document) -> ProcessorResult<Document> {
        let patches = self.checkpoint_cache.flush(&current);
        if patches.is_empty() {
            return Ok(current);
        }
        debug!(count = patches.len(), "writing checkpoints");
        apply_patches(&current, &patches)
    }

    /// Events returned by every registered contract's `init`, collected in
    /// document order (parents before children, keys sorted).
    fn bootstrap_events(&self, document: &Document) -> Vec<EventNode> {
        let mut out = Vec::new();
        self.collect_init_events(document.as_value(), "/", &mut out);
        out
    }

    fn collect_init_events(&self, node: &Value, node_path: &str, out: &mut Vec<EventNode>) {
        let Some(map) = node.as_object() else {
            return;
        };

        if let Some(contracts) = map.get(CONTRACTS_KEY).and_then(Value::as_object) {
            for (name, contract) in contracts {
                let Some(processor) = TypeRef::of(contract).and_then(|t| self.registry.get(&t)) else {
                    continue;
                };
                for mut event in processor.init(contract, node_path, name) {
                    if event.source.is_none() {
                        event.source = Some(EventSource::Internal);
                    }
                    if event.dispatch_path.is_none() {
                        event.dispatch_path = Some(node_path.to_string());
                    }
                    out.push(event);
                }
            }
        }

        for (key, child) in map {
            if key != CONTRACTS_KEY {
                self.collect_init_events(child, &make_path(node_path, &escape_segment(key)), out);
            }
        }
    }

    async fn blue_id(&self, value: &Value) -> ProcessorResult<String> {
        self.blue
            .calculate_blue_id(value)
            .await
            .map_err(|e| ProcessorError::Hashing(e.into()))
    }
}

fn is_initialized(document: &Document) -> bool {
    document
        .contract("/", INITIALIZED_CONTRACT_NAME)
        .and_then(TypeRef::of)
        .is_some_and(|t| t.matches(INITIALIZED_MARKER, INITIALIZED_MARKER))
}

/// Rejects a patch that reaches into an embedded document from a contract
/// that lives outside it.
fn guard_embedded_write(document: &Document, patch: &Patch, writer_path: &str) -> ProcessorResult<()> {
    for spec in collect_embedded_paths(document.as_value()) {
        let touches = patch
            .touched_paths()
            .into_iter()
            .any(|path| is_inside(path, &spec.abs_path));
        if touches && !is_inside(writer_path, &spec.abs_path) {
            return Err(ProcessorError::EmbeddedDocumentModification {
                patch: patch.clone(),
                embedded_path: spec.abs_path,
                writer_path: writer_path.to_string(),
            });
        }
    }
    Ok(())
}
