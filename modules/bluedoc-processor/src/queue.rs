//! Total order over pending handler invocations.
//!
//! Tasks execute in ascending lexicographic order of
//! (`-depth`, `seq`, `type_priority`, `contract_order`, `contract_name`, `task_id`):
//! deeper nodes react first, then causal submission order, then contract-kind
//! and per-contract priority, then deterministic tie-breaks.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde_json::Value;

use crate::event::EventNode;

/// Sort key of a queued task.
///
/// `contract_order` keeps the contract's numeric `order` as written, so
/// fractional orders sort between their integer neighbours.
#[derive(Debug, Clone)]
pub struct TaskKey {
    pub neg_depth: i64,
    pub seq: u64,
    pub type_priority: i64,
    pub contract_order: f64,
    pub contract_name: String,
    pub task_id: u64,
}

pub fn make_task_key(
    depth: usize,
    event_seq: u64,
    type_priority: i64,
    contract_order: f64,
    contract_name: &str,
    task_id: u64,
) -> TaskKey {
    TaskKey {
        neg_depth: -(depth as i64),
        seq: event_seq,
        type_priority,
        contract_order,
        contract_name: contract_name.to_string(),
        task_id,
    }
}

/// Field-by-field comparison; the first unequal field decides.
/// Names compare by code point, which is byte order for UTF-8.
pub fn compare_tasks(a: &TaskKey, b: &TaskKey) -> Ordering {
    a.neg_depth
        .cmp(&b.neg_depth)
        .then_with(|| a.seq.cmp(&b.seq))
        .then_with(|| a.type_priority.cmp(&b.type_priority))
        .then_with(|| a.contract_order.total_cmp(&b.contract_order))
        .then_with(|| a.contract_name.cmp(&b.contract_name))
        .then_with(|| a.task_id.cmp(&b.task_id))
}

impl PartialEq for TaskKey {
    fn eq(&self, other: &Self) -> bool {
        compare_tasks(self, other) == Ordering::Equal
    }
}

impl Eq for TaskKey {}

impl PartialOrd for TaskKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_tasks(self, other)
    }
}

/// A scheduled handler invocation. Immutable once queued.
#[derive(Debug, Clone)]
pub struct Task {
    pub key: TaskKey,
    pub node_path: String,
    pub contract_name: String,
    /// Contract node as seen when the task was scheduled. Execution reads
    /// the current snapshot; this copy is kept for diagnostics.
    pub contract_node: Value,
    pub event: EventNode,
}

struct Queued(Task);

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.key.cmp(&other.0.key)
    }
}

/// Min-priority queue of tasks keyed by [`TaskKey`].
#[derive(Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<Queued>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.heap.push(Reverse(Queued(task)));
    }

    /// Removes and returns the task with the lowest key.
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|Reverse(Queued(task))| task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}
