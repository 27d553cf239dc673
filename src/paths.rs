//! Slash-separated node path helpers.

/// Parent of a node path. `"/a/b"` yields `"/a"`; a top-level node such as
/// `"/a"` yields `""`, which means the parent is the namespace root itself.
pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final path segment, without any leading slash.
pub(crate) fn leaf_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a directory path and a child leaf name.
pub(crate) fn join(dir: &str, leaf: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), leaf)
}
