//! Restricted JSON-Patch over document snapshots.
//!
//! Supports `add`, `replace`, `remove`, `move` and `copy`. `add` and
//! `replace` upsert object members and create missing intermediate objects,
//! so a handler can write `/a/b/c` into a document that has no `/a` yet.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{resolve, Document};
use crate::error::{PatchError, ProcessorError, ProcessorResult};
use crate::path::{is_inside, make_path, normalize, split_path, unescape_segment};

/// One patch operation. Wire format: `{ "op": "add", "path": "/x", "val": 1 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Patch {
    Add { path: String, val: Value },
    Replace { path: String, val: Value },
    Remove { path: String },
    Move { from: String, path: String },
    Copy { from: String, path: String },
}

impl Patch {
    pub fn add(path: impl Into<String>, val: Value) -> Self {
        Self::Add {
            path: path.into(),
            val,
        }
    }

    pub fn replace(path: impl Into<String>, val: Value) -> Self {
        Self::Replace {
            path: path.into(),
            val,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Replace { path, .. }
            | Self::Remove { path }
            | Self::Move { path, .. }
            | Self::Copy { path, .. } => path,
        }
    }

    pub fn from_path(&self) -> Option<&str> {
        match self {
            Self::Move { from, .. } | Self::Copy { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Every path the patch reads from or writes to.
    pub fn touched_paths(&self) -> Vec<&str> {
        let mut out = vec![self.path()];
        out.extend(self.from_path());
        out
    }

    /// Rewrites `path` (and `from`) to be absolute beneath `base`.
    pub fn rebased(self, base: &str) -> Self {
        match self {
            Self::Add { path, val } => Self::Add {
                path: make_path(base, &path),
                val,
            },
            Self::Replace { path, val } => Self::Replace {
                path: make_path(base, &path),
                val,
            },
            Self::Remove { path } => Self::Remove {
                path: make_path(base, &path),
            },
            Self::Move { from, path } => Self::Move {
                from: make_path(base, &from),
                path: make_path(base, &path),
            },
            Self::Copy { from, path } => Self::Copy {
                from: make_path(base, &from),
                path: make_path(base, &path),
            },
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// Applies `patches` in order and returns the resulting snapshot.
///
/// The input snapshot is never modified. An empty patch list returns the same
/// snapshot; any failure aborts with the offending patch attached.
pub fn apply_patches(document: &Document, patches: &[Patch]) -> ProcessorResult<Document> {
    if patches.is_empty() {
        return Ok(document.clone());
    }

    let mut value = document.as_value().clone();
    for patch in patches {
        apply_patch(&mut value, patch).map_err(|source| ProcessorError::PatchApplication {
            patch: patch.clone(),
            source,
        })?;
        debug!(%patch, "patch applied");
    }
    Ok(Document::new(value))
}

/// Applies a single patch to a mutable tree.
pub fn apply_patch(root: &mut Value, patch: &Patch) -> Result<(), PatchError> {
    match patch {
        Patch::Add { path, val } => add(root, path, val.clone()),
        Patch::Replace { path, val } => replace(root, path, val.clone()),
        Patch::Remove { path } => remove(root, path).map(|_| ()),
        Patch::Copy { from, path } => {
            let value = resolve(root, from)
                .cloned()
                .ok_or_else(|| PatchError::PathNotFound { path: from.clone() })?;
            add(root, path, value)
        }
        Patch::Move { from, path } => {
            if normalize(from) == normalize(path) {
                return Ok(());
            }
            if is_inside(path, from) {
                return Err(PatchError::MoveIntoSelf {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(root, from)?;
            add(root, path, value)
        }
    }
}

fn add(root: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let Some((parent, key)) = parent_of(root, path, true)? else {
        *root = value;
        return Ok(());
    };
    match parent {
        Value::Object(map) => {
            map.insert(key, value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(&key, path)?;
            if index > items.len() {
                return Err(PatchError::InvalidIndex {
                    path: path.to_string(),
                    index: key,
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            segment: key,
        }),
    }
}

fn replace(root: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let Some((parent, key)) = parent_of(root, path, true)? else {
        *root = value;
        return Ok(());
    };
    match parent {
        Value::Object(map) => {
            map.insert(key, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(&key, path)?;
            let slot = items.get_mut(index).ok_or_else(|| PatchError::InvalidIndex {
                path: path.to_string(),
                index: key.clone(),
            })?;
            *slot = value;
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            segment: key,
        }),
    }
}

fn remove(root: &mut Value, path: &str) -> Result<Value, PatchError> {
    let Some((parent, key)) = parent_of(root, path, false)? else {
        return Err(PatchError::RemoveRoot);
    };
    match parent {
        Value::Object(map) => map.remove(&key).ok_or_else(|| PatchError::PathNotFound {
            path: path.to_string(),
        }),
        Value::Array(items) => {
            let index = parse_index(&key, path)?;
            if index >= items.len() {
                return Err(PatchError::InvalidIndex {
                    path: path.to_string(),
                    index: key,
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
            segment: key,
        }),
    }
}

/// Walks to the parent container of `path` and returns it with the final key.
/// `None` means `path` addresses the root itself.
fn parent_of<'a>(
    root: &'a mut Value,
    path: &str,
    create_missing: bool,
) -> Result<Option<(&'a mut Value, String)>, PatchError> {
    let mut segments: Vec<String> = split_path(path)
        .iter()
        .map(|s| unescape_segment(s))
        .collect();
    let Some(last) = segments.pop() else {
        return Ok(None);
    };

    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => {
                if create_missing && !map.contains_key(&segment) {
                    map.insert(segment.clone(), Value::Object(Map::new()));
                }
                map.get_mut(&segment).ok_or_else(|| PatchError::PathNotFound {
                    path: path.to_string(),
                })?
            }
            Value::Array(items) => {
                let index = parse_index(&segment, path)?;
                items.get_mut(index).ok_or_else(|| PatchError::InvalidIndex {
                    path: path.to_string(),
                    index: segment.clone(),
                })?
            }
            _ => {
                return Err(PatchError::NotAContainer {
                    path: path.to_string(),
                    segment,
                })
            }
        };
    }
    Ok(Some((current, last)))
}

fn parse_index(segment: &str, path: &str) -> Result<usize, PatchError> {
    segment.parse().map_err(|_| PatchError::InvalidIndex {
        path: path.to_string(),
        index: segment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::new(json!({
            "profile": { "name": "Bob" },
            "items": [1, 2, 3]
        }))
    }

    #[test]
    fn empty_patch_list_returns_same_snapshot() {
        let original = doc();
        let patched = apply_patches(&original, &[]).unwrap();
        assert_eq!(patched, original);
        assert!(patched.same_snapshot(&original));
    }

    #[test]
    fn patch_and_inverse_restore_document() {
        let original = doc();
        let added = apply_patches(&original, &[Patch::add("/profile/age", json!(42))]).unwrap();
        assert_eq!(added.get("/profile/age"), Some(&json!(42)));

        let restored = apply_patches(&added, &[Patch::remove("/profile/age")]).unwrap();
        assert_eq!(restored, original);

        let replaced =
            apply_patches(&original, &[Patch::replace("/profile/name", json!("Alice"))]).unwrap();
        let back = apply_patches(&replaced, &[Patch::replace("/profile/name", json!("Bob"))]).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn input_snapshot_is_untouched() {
        let original = doc();
        let before = original.as_value().clone();
        let _ = apply_patches(&original, &[Patch::remove("/profile")]).unwrap();
        assert_eq!(original.as_value(), &before);
    }

    #[test]
    fn add_creates_missing_parents_and_handles_arrays() {
        let patched = apply_patches(
            &doc(),
            &[
                Patch::add("/a/b/c", json!(true)),
                Patch::add("/items/-", json!(4)),
                Patch::add("/items/0", json!(0)),
            ],
        )
        .unwrap();
        assert_eq!(patched.get("/a/b/c"), Some(&json!(true)));
        assert_eq!(patched.get("/items"), Some(&json!([0, 1, 2, 3, 4])));
    }

    #[test]
    fn move_and_copy_relocate_values() {
        let patched = apply_patches(
            &doc(),
            &[
                Patch::Copy {
                    from: "/profile/name".into(),
                    path: "/alias".into(),
                },
                Patch::Move {
                    from: "/items".into(),
                    path: "/archive/items".into(),
                },
            ],
        )
        .unwrap();
        assert_eq!(patched.get("/alias"), Some(&json!("Bob")));
        assert_eq!(patched.get("/profile/name"), Some(&json!("Bob")));
        assert_eq!(patched.get("/archive/items"), Some(&json!([1, 2, 3])));
        assert!(patched.get("/items").is_none());
    }

    #[test]
    fn failures_carry_the_offending_patch() {
        let bad = Patch::remove("/profile/missing");
        let err = apply_patches(&doc(), &[bad.clone()]).unwrap_err();
        match err {
            ProcessorError::PatchApplication { patch, source } => {
                assert_eq!(patch, bad);
                assert_eq!(
                    source,
                    PatchError::PathNotFound {
                        path: "/profile/missing".into()
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn move_into_own_descendant_is_rejected() {
        let err = apply_patch(
            &mut json!({ "a": { "b": 1 } }),
            &Patch::Move {
                from: "/a".into(),
                path: "/a/b/c".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::MoveIntoSelf { .. }));
    }

    #[test]
    fn rebased_paths_are_absolute_under_base() {
        let patch = Patch::replace("/total", json!(1)).rebased("/order");
        assert_eq!(patch.path(), "/order/total");
        let wire: Patch =
            serde_json::from_value(json!({ "op": "move", "from": "/a", "path": "/b" })).unwrap();
        assert_eq!(wire.touched_paths(), vec!["/b", "/a"]);
    }
}
