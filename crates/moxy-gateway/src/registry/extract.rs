/// Derive a service's local target from its fully qualified remote URL.
///
/// Returns everything after the slash that ends the authority, so
/// `http://host:8080/svc/path` yields `svc/path`. The parse is purely textual:
/// no percent-decoding and the query string is kept as-is. `None` when the URL
/// has no scheme separator or no path after the authority.
pub fn extract_local_target(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let (authority, path) = rest.split_once('/')?;
    if authority.is_empty() {
        return None;
    }
    Some(path.to_string())
}
