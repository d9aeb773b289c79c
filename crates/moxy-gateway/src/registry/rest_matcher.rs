//! Prefix matching of inbound REST calls against configured local targets.

/// Return the id of the first candidate whose local target is a prefix of
/// `call`. Candidates are scanned in the given order; the caller decides
/// precedence.
pub fn match_call<'a, I>(candidates: I, call: &str) -> Option<i64>
where
    I: IntoIterator<Item = (i64, &'a str)>,
{
    candidates
        .into_iter()
        .find(|(_, local_target)| call.starts_with(local_target))
        .map(|(id, _)| id)
}

/// Backend URL for `call`: whatever follows the first occurrence of
/// `local_target` is appended to `remote_target`.
pub fn effective_remote_url(call: &str, local_target: &str, remote_target: &str) -> String {
    match call.split_once(local_target) {
        Some((_, suffix)) if !local_target.is_empty() && !suffix.is_empty() => {
            format!("{remote_target}{suffix}")
        }
        _ => remote_target.to_string(),
    }
}
