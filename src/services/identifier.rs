// src/services/identifier.rs

//! Backend-safe identifiers for the write-once archive.
//!
//! Identifiers must be lower case, at most 100 characters of
//! `[a-z0-9_-]`, and start with an alphanumeric character. Shortening means
//! two paths can map to the same identifier; callers tolerate that.

/// Maximum identifier length accepted by the archive.
pub const MAX_IDENTIFIER_LEN: usize = 100;

/// Derive an archive identifier from an output path.
pub fn path_identifier(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut in_run = false;
    for c in path.chars() {
        let c = if c == ' ' { '_' } else { c };
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            collapsed.push(c.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            collapsed.push('_');
            in_run = true;
        }
    }

    // Only ASCII remains, so byte offsets are character offsets.
    let start = collapsed.len().saturating_sub(MAX_IDENTIFIER_LEN);
    collapsed[start..]
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}
