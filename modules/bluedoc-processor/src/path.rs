//! Slash-delimited document paths.
//!
//! Paths are absolute (`/` is the root) and segments use RFC 6901 escaping:
//! `~1` for `/` and `~0` for `~`. Helpers here operate on escaped segments;
//! only [`unescape_segment`] turns a segment back into a property key.

/// Joins `rel` onto `base` and normalizes the result.
///
/// A leading `/` on `rel` does not reset to the root: contract-relative paths
/// are always resolved beneath the contract's node. `.` segments are dropped
/// and `..` pops one segment.
pub fn make_path(base: &str, rel: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    join_segments(&segments)
}

/// Normalizes a path to its absolute form (`""` and `"/"` both become `/`).
pub fn normalize(path: &str) -> String {
    make_path("/", path)
}

/// Splits a path into its non-empty, still-escaped segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment.as_ref());
    }
    out
}

/// True when `target` equals `root` or lies beneath it.
pub fn is_inside(target: &str, root: &str) -> bool {
    let target = normalize(target);
    let root = normalize(root);
    if root == "/" || target == root {
        return true;
    }
    target.starts_with(&format!("{root}/"))
}

pub fn escape_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
