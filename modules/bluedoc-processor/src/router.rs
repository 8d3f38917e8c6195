//! Event routing: resolve the target node, match its contracts, then either
//! run adapters inline or schedule handlers on the task queue.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::blue::Blue;
use crate::config::ProcessorConfig;
use crate::constants::CONTRACTS_KEY;
use crate::context::ProcessingContext;
use crate::document::{collect_embedded_paths, Document, TypeRef};
use crate::error::{ProcessorError, ProcessorResult};
use crate::event::{EventNode, EventSource, ProcessingAction};
use crate::path::{is_inside, join_segments, normalize, split_path};
use crate::queue::{make_task_key, Task, TaskQueue};
use crate::registry::{ContractRegistry, ContractRole};

/// Counters and the task queue for one batch.
///
/// Owned by a single driver call, so independent processors never share
/// sequence numbers or task ids.
#[derive(Debug, Default)]
pub struct RoutingSession {
    next_seq: u64,
    next_task_id: u64,
    max_task_id: u64,
    queue: TaskQueue,
}

impl RoutingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Returns the event's sequence number, assigning the next one if it has
    /// none. A preset number is kept and later assignments continue past it.
    pub fn assign_seq(&mut self, event: &mut EventNode) -> u64 {
        match event.seq {
            Some(seq) => {
                self.next_seq = self.next_seq.max(seq);
                seq
            }
            None => {
                let seq = self.next_seq();
                event.seq = Some(seq);
                seq
            }
        }
    }

    pub fn next_task_id(&mut self) -> u64 {
        self.next_task_id += 1;
        self.next_task_id
    }

    /// Highest task id issued so far, including offsets.
    pub fn max_task_id(&self) -> u64 {
        self.max_task_id
    }

    pub fn pop_task(&mut self) -> Option<Task> {
        self.queue.pop()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn schedule(&mut self, task: Task) {
        self.max_task_id = self.max_task_id.max(task.key.task_id);
        self.queue.push(task);
    }
}

pub struct EventRouter<'a> {
    registry: &'a ContractRegistry,
    blue: Arc<dyn Blue>,
    config: &'a ProcessorConfig,
}

impl<'a> EventRouter<'a> {
    pub fn new(registry: &'a ContractRegistry, blue: Arc<dyn Blue>, config: &'a ProcessorConfig) -> Self {
        Self {
            registry,
            blue,
            config,
        }
    }

    /// Routes `event` to the node at `segments` against `document`.
    ///
    /// With empty `segments` the target comes from the event: its
    /// `dispatch_path` first, then (for channel events) its origin node.
    /// Adapters run before this returns; handlers are only queued.
    pub fn route<'s>(
        &'s self,
        session: &'s mut RoutingSession,
        document: &'s Document,
        segments: Vec<String>,
        mut event: EventNode,
        after_task_id: u64,
        inline_depth: usize,
    ) -> BoxFuture<'s, ProcessorResult<()>> {
        Box::pin(async move {
            let seq = session.assign_seq(&mut event);

            let segments = if segments.is_empty() {
                self.target_segments(document, &mut event)?
            } else {
                segments
            };
            let node_path = join_segments(&segments);

            let Some(node) = document.node(&node_path) else {
                debug!(node_path = %node_path, seq, "no document node at target, dropping event");
                return Ok(());
            };

            if event.is_channel() {
                let origin = event.origin_node_path.as_deref().map(normalize);
                if origin.as_deref() != Some(node_path.as_str()) {
                    trace!(node_path = %node_path, ?origin, "channel event not local to node");
                    return Ok(());
                }
            }

            let Some(contracts) = node.get(CONTRACTS_KEY).and_then(Value::as_object) else {
                return Ok(());
            };

            for (name, contract) in contracts {
                let Some(type_ref) = TypeRef::of(contract) else {
                    continue;
                };
                let Some(processor) = self.registry.get(&type_ref) else {
                    warn!(
                        contract = %name,
                        node_path = %node_path,
                        contract_type = %type_ref,
                        "No processor registered for contract type"
                    );
                    continue;
                };

                let hopped = event.with_hop(&node_path, name);
                let mut ctx = ProcessingContext::new(
                    document.clone(),
                    node_path.clone(),
                    name.clone(),
                    hopped.clone(),
                    Arc::clone(&self.blue),
                );
                if !processor.supports(&hopped, contract, &ctx, name) {
                    continue;
                }

                match processor.role() {
                    ContractRole::Adapter => {
                        if inline_depth >= self.config.max_inline_depth {
                            return Err(ProcessorError::InlineDepthExceeded {
                                contract: name.clone(),
                                node_path: node_path.clone(),
                                limit: self.config.max_inline_depth,
                            });
                        }

                        debug!(contract = %name, node_path = %node_path, seq, inline_depth, "adapter");
                        processor
                            .handle(&hopped, contract, &mut ctx, name)
                            .await
                            .map_err(|source| ProcessorError::Handler {
                                contract: name.clone(),
                                node_path: node_path.clone(),
                                source: source.into(),
                            })?;

                        let actions = ctx.flush();
                        if actions.iter().any(ProcessingAction::is_patch) {
                            return Err(ProcessorError::AdapterPatch {
                                contract: name.clone(),
                                node_path: node_path.clone(),
                            });
                        }
                        for action in actions {
                            if let ProcessingAction::Event(emitted) = action {
                                self.route(
                                    session,
                                    document,
                                    Vec::new(),
                                    emitted,
                                    after_task_id,
                                    inline_depth + 1,
                                )
                                .await?;
                            }
                        }
                    }
                    ContractRole::Handler => {
                        let task_id = session.next_task_id() + after_task_id;
                        let key = make_task_key(
                            segments.len(),
                            seq,
                            self.registry.order_of(&type_ref),
                            contract_order(contract),
                            name,
                            task_id,
                        );
                        debug!(contract = %name, node_path = %node_path, seq, task_id, "handler scheduled");
                        session.schedule(Task {
                            key,
                            node_path: node_path.clone(),
                            contract_name: name.clone(),
                            contract_node: contract.clone(),
                            event: hopped,
                        });
                    }
                    ContractRole::Validator | ContractRole::Marker => {}
                }
            }

            Ok::<(), ProcessorError>(())
        })
    }

    /// Resolves the target of an event routed without explicit segments.
    fn target_segments(&self, document: &Document, event: &mut EventNode) -> ProcessorResult<Vec<String>> {
        if let Some(target) = event.dispatch_path.take() {
            if event.source == Some(EventSource::External) && event.root_event.is_none() {
                ensure_not_embedded(document, &target)?;
            }
            return Ok(split_path(&target));
        }

        if event.is_channel() {
            if let Some(origin) = event.origin_node_path.as_deref() {
                return Ok(split_path(origin));
            }
        }
        Ok(Vec::new())
    }
}

/// Rejects a caller-supplied dispatch that lands inside an embedded document.
/// Embedding contracts are collected from this snapshot on every call.
fn ensure_not_embedded(document: &Document, target: &str) -> ProcessorResult<()> {
    let target = normalize(target);
    match collect_embedded_paths(document.as_value())
        .into_iter()
        .find(|spec| is_inside(&target, &spec.abs_path))
    {
        Some(spec) => Err(ProcessorError::EmbeddedRouting {
            target,
            embedded_path: spec.abs_path,
            contract_path: spec.contract_path,
        }),
        None => Ok(()),
    }
}

/// Per-instance priority from the contract's optional numeric `order`.
fn contract_order(contract: &Value) -> f64 {
    contract.get("order").and_then(Value::as_f64).unwrap_or(0.0)
}
