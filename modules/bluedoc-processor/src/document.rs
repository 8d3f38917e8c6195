//! Immutable document snapshots and read helpers over the JSON tree.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::constants::{CONTRACTS_KEY, PROCESS_EMBEDDED};
use crate::path::{escape_segment, make_path, split_path, unescape_segment};

/// A frozen document snapshot.
///
/// Cloning shares the tree. The engine never mutates a snapshot in place:
/// patches produce a new `Document` and leave every earlier one intact.
#[derive(Debug, Clone, PartialEq)]
pub struct Document(Arc<Value>);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Returns an owned copy of the tree, cloning only if still shared.
    pub fn into_value(self) -> Value {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone())
    }

    /// True when both handles point at the same snapshot.
    pub fn same_snapshot(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Resolves an absolute path; `/` is the root.
    pub fn get(&self, path: &str) -> Option<&Value> {
        resolve(&self.0, path)
    }

    /// The document node (a JSON object) at `path`, if any.
    pub fn node(&self, path: &str) -> Option<&Map<String, Value>> {
        self.get(path).and_then(Value::as_object)
    }

    pub fn contracts(&self, node_path: &str) -> Option<&Map<String, Value>> {
        self.node(node_path)
            .and_then(|node| node.get(CONTRACTS_KEY))
            .and_then(Value::as_object)
    }

    pub fn contract(&self, node_path: &str, name: &str) -> Option<&Value> {
        self.contracts(node_path).and_then(|contracts| contracts.get(name))
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Resolves an escaped, slash-delimited path inside `root`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in split_path(path) {
        let key = unescape_segment(&segment);
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Reference to a contract's type: either a catalogue name, a blue id, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRef<'a> {
    pub name: Option<&'a str>,
    pub blue_id: Option<&'a str>,
}

impl<'a> TypeRef<'a> {
    /// Reads the `type` of a contract node: `"Name"`, `{ blueId }` or `{ name }`.
    pub fn of(contract: &'a Value) -> Option<Self> {
        match contract.get("type")? {
            Value::String(name) => Some(Self::named(name)),
            Value::Object(map) => {
                let name = map.get("name").and_then(Value::as_str);
                let blue_id = map.get("blueId").and_then(Value::as_str);
                (name.is_some() || blue_id.is_some()).then_some(Self { name, blue_id })
            }
            _ => None,
        }
    }

    pub fn named(name: &'a str) -> Self {
        Self {
            name: Some(name),
            blue_id: None,
        }
    }

    pub fn matches(&self, type_name: &str, blue_id: &str) -> bool {
        self.blue_id == Some(blue_id) || self.name == Some(type_name)
    }
}

impl fmt::Display for TypeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name, self.blue_id) {
            (Some(name), _) => f.write_str(name),
            (None, Some(blue_id)) => write!(f, "blueId:{blue_id}"),
            (None, None) => f.write_str("<untyped>"),
        }
    }
}

/// An embedded document designated by a `Process Embedded` contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSpec {
    /// Absolute path of the embedded document.
    pub abs_path: String,
    /// Absolute path of the `Process Embedded` contract that claims it.
    pub contract_path: String,
}

/// Walks the whole tree and collects every embedded document path.
///
/// Always computed from the snapshot at hand: patches can add or remove
/// embedding contracts, so the result must never be reused across snapshots.
pub fn collect_embedded_paths(root: &Value) -> Vec<EmbeddedSpec> {
    let mut out = Vec::new();
    collect_embedded_into(root, "/", &mut out);
    out
}

fn collect_embedded_into(node: &Value, base: &str, out: &mut Vec<EmbeddedSpec>) {
    let Some(map) = node.as_object() else {
        return;
    };

    if let Some(contracts) = map.get(CONTRACTS_KEY).and_then(Value::as_object) {
        for (name, contract) in contracts {
            let is_embedding = TypeRef::of(contract)
                .is_some_and(|t| t.matches(PROCESS_EMBEDDED, PROCESS_EMBEDDED));
            if !is_embedding {
                continue;
            }
            let paths = contract.get("paths").and_then(Value::as_array);
            for rel in paths.into_iter().flatten().filter_map(Value::as_str) {
                out.push(EmbeddedSpec {
                    abs_path: make_path(base, rel),
                    contract_path: make_path(base, &format!("{CONTRACTS_KEY}/{name}")),
                });
            }
        }
    }

    for (key, child) in map {
        if key == CONTRACTS_KEY {
            continue;
        }
        let child_base = make_path(base, &escape_segment(key));
        collect_embedded_into(child, &child_base, out);
    }
}

/// True when every field of `pattern` appears, recursively, in `value`.
/// Arrays match when each pattern element is contained in some value element.
pub fn deep_contains(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(have), Value::Object(want)) => want
            .iter()
            .all(|(key, w)| have.get(key).is_some_and(|h| deep_contains(h, w))),
        (Value::Array(have), Value::Array(want)) => want
            .iter()
            .all(|w| have.iter().any(|h| deep_contains(h, w))),
        _ => value == pattern,
    }
}
