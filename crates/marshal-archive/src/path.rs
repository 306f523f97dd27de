//! Slash-separated container path helpers
//!
//! Archive paths describe locations inside a container, not on the host, so
//! they are handled as `/`-separated strings regardless of the host platform.

/// Strip trailing separators, keeping a lone `/` intact.
pub fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Join `path` under `base` with exactly one separator between them.
///
/// An empty `base` leaves `path` as-is (minus trailing separators). A leading
/// separator on `path` is ignored so absolute item paths nest under the base.
pub fn join(base: &str, path: &str) -> String {
    if base.is_empty() {
        return trim_trailing(path).to_string();
    }

    let head = base.trim_end_matches('/');
    let tail = path.trim_matches('/');
    match (head.is_empty(), tail.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{tail}"),
        (false, true) => head.to_string(),
        (false, false) => format!("{head}/{tail}"),
    }
}

/// Returns true if `path` equals `dir` or is nested below it.
///
/// Matching is on whole path segments: `/ab` is not within `/a`.
pub fn is_within(dir: &str, path: &str) -> bool {
    let dir = trim_trailing(dir);
    let path = trim_trailing(path);

    if dir == "/" {
        return path.starts_with('/');
    }

    match path.strip_prefix(dir) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/// Name of the first segment of `path` strictly below `dir`.
///
/// Returns `None` when `path` is `dir` itself or lies outside it.
pub fn first_segment_below<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    if !is_within(dir, path) {
        return None;
    }

    let dir = trim_trailing(dir);
    let path = trim_trailing(path);
    let rest = if dir == "/" {
        &path[1..]
    } else {
        &path[dir.len()..]
    };

    rest.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}
