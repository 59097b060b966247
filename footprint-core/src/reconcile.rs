//! Reconciliation engine.
//!
//! Pure function over a completed job's findings and a snapshot of the
//! known-accounts registry. It only proposes additions; applying them back
//! to the person record is the caller's job, against the same snapshot.

use std::collections::HashSet;

use tracing::debug;

use footprint_model::{
    AccountRecord, Candidate, PlatformFinding, ReconciliationOutcome, ReconciliationReport,
    ReconciliationSummary,
};

use crate::normalize::normalize_platform_key;

/// Derive candidate account additions from `findings`.
///
/// Only claimed findings with a usable URL are considered. A candidate is
/// never emitted for a canonical key already present in `known` (existing
/// keys are re-normalized defensively to tolerate legacy unnormalized
/// data), and two findings normalizing to the same key yield one candidate.
/// Candidates keep the findings' first-appearance order. Never fails:
/// malformed findings are simply not candidates.
pub fn reconcile(
    subject_query: &str,
    findings: &[PlatformFinding],
    known: &AccountRecord,
) -> ReconciliationReport {
    let mut seen_keys: HashSet<String> = known
        .accounts
        .keys()
        .map(|key| normalize_platform_key(key))
        .collect();

    let mut candidates = Vec::new();
    let mut total_claimed = 0usize;

    for finding in findings {
        if !finding.is_claimed() {
            continue;
        }
        total_claimed += 1;

        let key = normalize_platform_key(&finding.platform_label);
        if key.is_empty() || seen_keys.contains(&key) {
            debug!(label = %finding.platform_label, %key, "skipping already-known platform");
            continue;
        }

        let url = finding
            .claimed_url
            .clone()
            .unwrap_or_default();
        let handle = finding
            .observed_handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(subject_query)
            .to_owned();

        seen_keys.insert(key.clone());
        candidates.push(Candidate {
            platform_key: key,
            display_label: finding.platform_label.clone(),
            url,
            handle,
        });
    }

    let new_candidates = candidates.len();
    let outcome = if new_candidates > 0 {
        ReconciliationOutcome::NewCandidates
    } else if total_claimed > 0 {
        ReconciliationOutcome::AllKnown
    } else {
        ReconciliationOutcome::NothingFound
    };

    ReconciliationReport {
        candidates,
        summary: ReconciliationSummary {
            total_claimed,
            new_candidates,
            skipped_existing: total_claimed - new_candidates,
            outcome,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use footprint_model::{AccountEntry, AccountStatus, FindingStatus};

    fn claimed(label: &str, url: &str) -> PlatformFinding {
        PlatformFinding {
            platform_label: label.into(),
            status: FindingStatus::Claimed,
            claimed_url: Some(url.into()),
            observed_handle: None,
        }
    }

    fn known(keys: &[(&str, &str)]) -> AccountRecord {
        let mut record = AccountRecord::new();
        for (key, handle) in keys {
            record
                .accounts
                .insert((*key).into(), AccountEntry::Handle((*handle).into()));
        }
        record
    }

    #[test]
    fn new_platform_becomes_candidate_with_subject_handle() {
        let findings = vec![claimed("GitHub", "https://github.com/jdoe")];
        let report = reconcile("jdoe", &findings, &AccountRecord::new());

        assert_eq!(report.candidates.len(), 1);
        let candidate = &report.candidates[0];
        assert_eq!(candidate.platform_key, "github");
        assert_eq!(candidate.display_label, "GitHub");
        assert_eq!(candidate.handle, "jdoe");
        assert_eq!(report.summary.total_claimed, 1);
        assert_eq!(report.summary.new_candidates, 1);
        assert_eq!(report.summary.skipped_existing, 0);
        assert_eq!(report.summary.outcome, ReconciliationOutcome::NewCandidates);
    }

    #[test]
    fn known_platform_is_skipped_not_overwritten() {
        let findings = vec![claimed("Reddit", "https://reddit.com/user/jdoe")];
        let report = reconcile("jdoe", &findings, &known(&[("reddit", "jdoe99")]));

        assert!(report.candidates.is_empty());
        assert_eq!(report.summary.total_claimed, 1);
        assert_eq!(report.summary.skipped_existing, 1);
        assert_eq!(report.summary.outcome, ReconciliationOutcome::AllKnown);
    }

    #[test]
    fn labels_with_equal_keys_are_the_same_platform() {
        // dedup property: normalize(l1) == normalize(l2) => one platform
        let findings = vec![
            claimed(" Hacker News ", "https://news.ycombinator.com/user?id=jdoe"),
            claimed("hacker news", "https://news.ycombinator.com/user?id=jdoe2"),
        ];
        let report = reconcile("jdoe", &findings, &AccountRecord::new());

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].platform_key, "hacker_news");
        assert_eq!(report.summary.total_claimed, 2);
        assert_eq!(report.summary.skipped_existing, 1);
    }

    #[test]
    fn legacy_unnormalized_known_keys_still_dedup() {
        let findings = vec![claimed("ask fedora", "https://ask.fedoraproject.org/u/jdoe")];
        let report = reconcile("jdoe", &findings, &known(&[("Ask Fedora", "jdoe")]));
        assert!(report.candidates.is_empty());
        assert_eq!(report.summary.skipped_existing, 1);
    }

    #[test]
    fn root_entries_are_never_targeted() {
        let mut record = AccountRecord::new();
        record.accounts.insert(
            "github".into(),
            AccountEntry::Detailed {
                handle: "verified".into(),
                status: AccountStatus::Confirmed,
                root: true,
            },
        );
        let findings = vec![claimed("GitHub", "https://github.com/impostor")];
        let report = reconcile("impostor", &findings, &record);
        assert!(report.candidates.is_empty());
    }

    #[test]
    fn unclaimed_and_urlless_findings_are_ignored() {
        let findings = vec![
            PlatformFinding {
                platform_label: "Reddit".into(),
                status: FindingStatus::NotFound,
                claimed_url: None,
                observed_handle: None,
            },
            PlatformFinding {
                platform_label: "X".into(),
                status: FindingStatus::Claimed,
                claimed_url: None,
                observed_handle: None,
            },
            PlatformFinding {
                platform_label: "Mastodon".into(),
                status: FindingStatus::Unknown,
                claimed_url: Some("https://mastodon.social/@jdoe".into()),
                observed_handle: None,
            },
        ];
        let report = reconcile("jdoe", &findings, &AccountRecord::new());

        assert!(report.candidates.is_empty());
        assert_eq!(report.summary.total_claimed, 0);
        assert_eq!(report.summary.outcome, ReconciliationOutcome::NothingFound);
    }

    #[test]
    fn observed_handle_wins_over_subject_query() {
        let mut finding = claimed("GitHub", "https://github.com/jdoe-alt");
        finding.observed_handle = Some("jdoe-alt".into());
        let report = reconcile("jdoe", &[finding], &AccountRecord::new());
        assert_eq!(report.candidates[0].handle, "jdoe-alt");
    }

    #[test]
    fn candidates_keep_first_appearance_order() {
        let findings = vec![
            claimed("Zulip", "https://zulip.com/jdoe"),
            claimed("BitBucket", "https://bitbucket.org/jdoe"),
            claimed("Apple Discussions", "https://discussions.apple.com/jdoe"),
        ];
        let report = reconcile("jdoe", &findings, &AccountRecord::new());
        let keys: Vec<&str> = report
            .candidates
            .iter()
            .map(|c| c.platform_key.as_str())
            .collect();
        assert_eq!(keys, vec!["zulip", "bitbucket", "apple_discussions"]);
    }

    #[test]
    fn summary_counts_always_balance() {
        // mixed bag: one new, one known, one unclaimed
        let findings = vec![
            claimed("GitHub", "https://github.com/jdoe"),
            claimed("Reddit", "https://reddit.com/user/jdoe"),
            PlatformFinding {
                platform_label: "X".into(),
                status: FindingStatus::NotFound,
                claimed_url: None,
                observed_handle: None,
            },
        ];
        let report = reconcile("jdoe", &findings, &known(&[("reddit", "jdoe99")]));

        let summary = report.summary;
        assert_eq!(
            summary.total_claimed,
            summary.new_candidates + summary.skipped_existing
        );
        assert_eq!(summary.new_candidates, 1);
        assert_eq!(summary.skipped_existing, 1);
    }

    #[test]
    fn empty_inputs_report_nothing_found() {
        let report = reconcile("jdoe", &[], &known(&[("reddit", "jdoe99")]));
        assert!(report.candidates.is_empty());
        assert_eq!(report.summary.outcome, ReconciliationOutcome::NothingFound);
    }
}
