//! Account registry types and the reconciliation report shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Verification state of a stored account entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Unconfirmed,
    Confirmed,
    Rejected,
}

/// One stored account: either a bare handle (legacy shape) or a structured
/// entry. `root: true` marks the canonical, manually-verified presence;
/// automated reconciliation must never propose overwriting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountEntry {
    Detailed {
        handle: String,
        #[serde(default)]
        status: AccountStatus,
        #[serde(default)]
        root: bool,
    },
    Handle(String),
}

impl AccountEntry {
    pub fn handle(&self) -> &str {
        match self {
            AccountEntry::Handle(h) => h,
            AccountEntry::Detailed { handle, .. } => handle,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, AccountEntry::Detailed { root: true, .. })
    }

    /// Structured form of a legacy bare-handle entry.
    pub fn into_detailed(self) -> AccountEntry {
        match self {
            AccountEntry::Handle(handle) => AccountEntry::Detailed {
                handle,
                status: AccountStatus::Unconfirmed,
                root: false,
            },
            detailed => detailed,
        }
    }
}

/// A person's known accounts, keyed by canonical platform key.
///
/// Owned by the person record; reconciliation only reads this and proposes
/// additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AccountRecord {
    pub accounts: BTreeMap<String, AccountEntry>,
}

impl AccountRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.accounts.contains_key(key)
    }
}

/// A proposed new account entry, not yet applied to the person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Canonical key the entry would be stored under.
    pub platform_key: String,
    /// The producer's raw label, for display.
    pub display_label: String,
    pub url: String,
    pub handle: String,
}

/// Why a reconciliation run produced the candidate list it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// At least one new candidate was proposed.
    NewCandidates,
    /// The search found accounts, but every one is already registered.
    AllKnown,
    /// The search found no claimed accounts at all.
    NothingFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_claimed: usize,
    pub new_candidates: usize,
    pub skipped_existing: usize,
    pub outcome: ReconciliationOutcome,
}

/// Full output of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub candidates: Vec<Candidate>,
    pub summary: ReconciliationSummary,
}
