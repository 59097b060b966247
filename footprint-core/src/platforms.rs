//! Process-scoped platform lookup table and profile-URL resolution.
//!
//! The table is loaded once from a JSON document (slug -> platform info)
//! and passed explicitly to whatever needs it; there is no ambient global
//! cache. Label-to-slug resolution runs a fixed priority list of pure
//! strategies, each testable in isolation, with a heuristic URL fallback at
//! the end of the chain.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::normalize::normalize_platform_key;

#[derive(Error, Debug)]
pub enum PlatformTableError {
    #[error("failed to read platform table: {0}")]
    Io(#[from] std::io::Error),

    #[error("platform table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One platform entry: display name plus an optional profile-URL template
/// with a `{}` placeholder for the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_template: Option<String>,
}

/// Lightweight row for autocomplete listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformListItem {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlatformTable {
    entries: BTreeMap<String, PlatformInfo>,
    /// normalized display name -> slug, for reverse lookups
    name_index: BTreeMap<String, String>,
}

impl PlatformTable {
    pub fn from_entries(entries: BTreeMap<String, PlatformInfo>) -> Self {
        let name_index = entries
            .iter()
            .map(|(slug, info)| (normalize_platform_key(&info.name), slug.clone()))
            .collect();
        Self {
            entries,
            name_index,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, PlatformTableError> {
        let entries: BTreeMap<String, PlatformInfo> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(entries))
    }

    /// Load-once entry point; callers own the resulting table and pass it
    /// where it is needed.
    pub fn load_from_path(path: &Path) -> Result<Self, PlatformTableError> {
        let raw = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), platforms = table.len(), "platform table loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, slug: &str) -> Option<&PlatformInfo> {
        self.entries.get(slug)
    }

    pub fn list(&self) -> Vec<PlatformListItem> {
        self.entries
            .iter()
            .map(|(slug, info)| PlatformListItem {
                slug: slug.clone(),
                name: info.name.clone(),
            })
            .collect()
    }
}

/// A single slug-resolution strategy. Pure: `(label, table) -> slug`.
pub type ResolutionStrategy = fn(&str, &PlatformTable) -> Option<String>;

/// Exact slug key match.
fn direct_match(label: &str, table: &PlatformTable) -> Option<String> {
    table.entries.contains_key(label).then(|| label.to_owned())
}

/// Slug key match ignoring ASCII case.
fn case_insensitive_match(label: &str, table: &PlatformTable) -> Option<String> {
    table
        .entries
        .keys()
        .find(|slug| slug.eq_ignore_ascii_case(label))
        .cloned()
}

/// The label's canonical key is itself a known slug.
fn normalized_match(label: &str, table: &PlatformTable) -> Option<String> {
    let key = normalize_platform_key(label);
    table.entries.contains_key(&key).then_some(key)
}

/// Reverse lookup: the label matches a platform's display name.
fn display_name_match(label: &str, table: &PlatformTable) -> Option<String> {
    table
        .name_index
        .get(&normalize_platform_key(label))
        .cloned()
}

/// Fixed priority order; earlier strategies win.
pub const RESOLUTION_STRATEGIES: &[ResolutionStrategy] = &[
    direct_match,
    case_insensitive_match,
    normalized_match,
    display_name_match,
];

/// Resolve a raw label to a table slug, trying each strategy in order.
pub fn resolve_slug(label: &str, table: &PlatformTable) -> Option<String> {
    RESOLUTION_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(label, table))
}

/// Best-effort profile URL for `handle` on the platform named by `label`.
///
/// Uses the table's URL template when the label resolves; otherwise guesses
/// `https://<key>.com/<handle>` from the canonical key. Labels that
/// normalize to nothing resolve to no URL at all.
pub fn resolve_profile_url(label: &str, handle: &str, table: &PlatformTable) -> Option<String> {
    if let Some(slug) = resolve_slug(label, table) {
        if let Some(template) = table.get(&slug).and_then(|info| info.url_template.as_ref()) {
            return Some(template.replace("{}", handle));
        }
    }

    let key = normalize_platform_key(label);
    if key.is_empty() {
        return None;
    }
    let host = key.replace(['_', '-'], "");
    Some(format!("https://{host}.com/{handle}"))
}
