//! Deterministic identifier sanitization.
//!
//! Every key sent to the remote store, and every block name emitted by the
//! exporter, is derived from human-supplied text through these functions.
//! Applying the same function everywhere guarantees that independently
//! computed references to the same entity agree.

/// Sanitizes one or more name parts into a single stable key.
///
/// Each character outside `[A-Za-z0-9_]` becomes `_`, empty parts are
/// dropped, and the surviving parts are joined with `_`. The function is
/// pure and idempotent: `sanitize_parts(&[sanitize_parts(p)])` returns the
/// same key.
///
/// # Example
///
/// ```rust
/// use policysync::ident::sanitize_parts;
///
/// assert_eq!(sanitize_parts(&["a b", "c-d"]), "a_b_c_d");
/// assert_eq!(sanitize_parts(&["", "blog post"]), "blog_post");
/// ```
pub fn sanitize_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Sanitizes a single name into a stable key.
///
/// Convenience wrapper over [`sanitize_parts`] for the common one-part case.
pub fn sanitize_key(name: &str) -> String {
    sanitize_parts(&[name])
}

/// Capitalizes the first character of a display name.
///
/// Used for role and resource display names so `viewer` renders as `Viewer`.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
