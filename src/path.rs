//! Lexical path cleaning for route patterns.

/// Joins a group prefix and a route path with `/`, then cleans the result.
///
/// `join("/v1", "users")`, `join("/v1/", "/users")` and `join("", "/v1/users")`
/// all give `/v1/users`.
pub fn join(prefix: &str, path: &str) -> String {
    clean(&format!("{prefix}/{path}"))
}

/// Returns the shortest path equivalent to `path` by purely lexical
/// processing:
///
/// 1. Collapse repeated slashes.
/// 2. Drop `.` segments.
/// 3. Drop each `..` together with the segment before it; `..` at the root
///    stays at the root.
///
/// The result always starts with `/` and never ends with one, except for the
/// root itself.
pub fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
