//! Canonical platform-key derivation.
//!
//! Two labels refer to the same platform iff their normalized keys are
//! equal; every dedup decision in the engine goes through this function.

/// Map an arbitrary platform label to its canonical key.
///
/// Trims surrounding whitespace, lowercases, collapses each interior
/// whitespace run to a single `_`, and strips every character outside
/// `[a-z0-9_-]`. Total and deterministic; unrecognizable labels come out
/// as the empty string.
pub fn normalize_platform_key(label: &str) -> String {
    let trimmed = label.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut pending_sep = false;

    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            pending_sep = true;
            continue;
        }
        for lc in ch.to_lowercase() {
            if matches!(lc, 'a'..='z' | '0'..='9' | '_' | '-') {
                // flush the separator only when something follows it, so
                // stripped punctuation cannot produce `__` or a trailing `_`
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push(lc);
            }
        }
    }

    out
}
