//! Postgres person repository.
//!
//! Owns the `accounts` registry writes. Candidate application is the only
//! automated write path into the registry and it never touches an existing
//! entry, so manually-verified (root) entries cannot be clobbered.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use footprint_core::normalize_platform_key;
use footprint_model::{
    AccountEntry, AccountRecord, Candidate, Person, PersonCreate, PersonUpdate,
};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct PgPersonStore {
    pool: PgPool,
}

/// Result of applying accepted candidates to a person's registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    /// Keys skipped because the registry already held them; a non-empty
    /// list tells the caller its reconciliation snapshot went stale.
    pub skipped: Vec<String>,
}

/// Reject account maps whose keys are not canonical platform keys, and
/// upgrade bare handles to structured entries.
pub fn normalize_account_record(record: AccountRecord) -> AppResult<AccountRecord> {
    let invalid: Vec<String> = record
        .accounts
        .keys()
        .filter(|key| normalize_platform_key(key) != **key || key.is_empty())
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(AppError::bad_request(format!(
            "invalid account keys: {}. Keys must be canonical platform keys \
             (lowercase, [a-z0-9_-])",
            invalid.join(", ")
        )));
    }

    let accounts = record
        .accounts
        .into_iter()
        .map(|(key, entry)| (key, entry.into_detailed()))
        .collect();
    Ok(AccountRecord { accounts })
}

/// Insert candidates into the registry without overwriting anything.
/// Returns the updated registry plus what was applied vs skipped.
pub fn apply_candidates(
    mut record: AccountRecord,
    candidates: &[Candidate],
) -> (AccountRecord, ApplyReport) {
    let mut report = ApplyReport {
        applied: Vec::new(),
        skipped: Vec::new(),
    };

    for candidate in candidates {
        let key = normalize_platform_key(&candidate.platform_key);
        if key.is_empty() {
            report.skipped.push(candidate.platform_key.clone());
            continue;
        }
        if record.contains(&key) {
            report.skipped.push(key);
            continue;
        }
        record.accounts.insert(
            key.clone(),
            AccountEntry::Detailed {
                handle: candidate.handle.clone(),
                status: Default::default(),
                root: false,
            },
        );
        report.applied.push(key);
    }

    (record, report)
}

fn map_person_row(row: &PgRow) -> AppResult<Person> {
    let accounts: serde_json::Value = row.try_get("accounts")?;
    let aliases: Option<serde_json::Value> = row.try_get("aliases")?;

    Ok(Person {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        accounts: serde_json::from_value(accounts)?,
        aliases: aliases.map(serde_json::from_value).transpose()?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const PERSON_COLUMNS: &str = "id, first_name, last_name, email, phone_number, \
                              accounts, aliases, notes, created_at, updated_at";

impl PgPersonStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, create: PersonCreate) -> AppResult<Person> {
        let accounts = normalize_account_record(create.accounts)?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO people
                (id, first_name, last_name, email, phone_number, accounts, aliases, notes,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {PERSON_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&create.first_name)
        .bind(&create.last_name)
        .bind(&create.email)
        .bind(&create.phone_number)
        .bind(serde_json::to_value(&accounts)?)
        .bind(create.aliases.as_ref().map(serde_json::to_value).transpose()?)
        .bind(&create.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        info!(person_id = %id, "person created");
        map_person_row(&row)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Person> {
        let row = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("person {id} not found")))?;

        map_person_row(&row)
    }

    pub async fn list(&self, limit: usize) -> AppResult<Vec<Person>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERSON_COLUMNS} FROM people ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_person_row).collect()
    }

    pub async fn update(&self, id: Uuid, update: PersonUpdate) -> AppResult<Person> {
        let mut person = self.get(id).await?;

        if let Some(first_name) = update.first_name {
            person.first_name = Some(first_name);
        }
        if let Some(last_name) = update.last_name {
            person.last_name = Some(last_name);
        }
        if let Some(email) = update.email {
            person.email = Some(email);
        }
        if let Some(phone_number) = update.phone_number {
            person.phone_number = Some(phone_number);
        }
        if let Some(accounts) = update.accounts {
            person.accounts = normalize_account_record(accounts)?;
        }
        if let Some(aliases) = update.aliases {
            person.aliases = Some(aliases);
        }
        if let Some(notes) = update.notes {
            person.notes = Some(notes);
        }

        self.persist(&mut person).await?;
        Ok(person)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let done = sqlx::query("DELETE FROM people WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found(format!("person {id} not found")));
        }
        info!(person_id = %id, "person deleted");
        Ok(())
    }

    /// Apply accepted candidates to the person's registry. The registry is
    /// re-read here, so keys accepted against a stale snapshot are reported
    /// back as skipped rather than silently overwritten.
    pub async fn apply_candidates(
        &self,
        id: Uuid,
        candidates: &[Candidate],
    ) -> AppResult<(Person, ApplyReport)> {
        let mut person = self.get(id).await?;
        let (accounts, report) = apply_candidates(person.accounts.clone(), candidates);

        if !report.skipped.is_empty() {
            warn!(
                person_id = %id,
                skipped = report.skipped.len(),
                "some candidates were already registered"
            );
        }

        if !report.applied.is_empty() {
            person.accounts = accounts;
            self.persist(&mut person).await?;
        }

        Ok((person, report))
    }

    async fn persist(&self, person: &mut Person) -> AppResult<()> {
        person.updated_at = Utc::now();
        sqlx::query(
            r#"
            UPDATE people
            SET first_name = $2, last_name = $3, email = $4, phone_number = $5,
                accounts = $6, aliases = $7, notes = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(person.id)
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(&person.email)
        .bind(&person.phone_number)
        .bind(serde_json::to_value(&person.accounts)?)
        .bind(person.aliases.as_ref().map(serde_json::to_value).transpose()?)
        .bind(&person.notes)
        .bind(person.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use footprint_model::AccountStatus;

    fn candidate(key: &str, handle: &str) -> Candidate {
        Candidate {
            platform_key: key.into(),
            display_label: key.into(),
            url: format!("https://{key}.com/{handle}"),
            handle: handle.into(),
        }
    }

    #[test]
    fn bare_handles_are_upgraded_to_structured_entries() {
        let mut record = AccountRecord::new();
        record
            .accounts
            .insert("github".into(), AccountEntry::Handle("jdoe".into()));

        let normalized = normalize_account_record(record).unwrap();
        match &normalized.accounts["github"] {
            AccountEntry::Detailed {
                handle,
                status,
                root,
            } => {
                assert_eq!(handle, "jdoe");
                assert_eq!(*status, AccountStatus::Unconfirmed);
                assert!(!root);
            }
            other => panic!("expected detailed entry, got {other:?}"),
        }
    }

    #[test]
    fn non_canonical_keys_are_rejected() {
        let mut record = AccountRecord::new();
        record
            .accounts
            .insert("My Cool Site".into(), AccountEntry::Handle("jdoe".into()));

        let err = normalize_account_record(record).unwrap_err();
        assert!(err.message.contains("My Cool Site"));
    }

    #[test]
    fn apply_inserts_only_missing_keys() {
        let mut record = AccountRecord::new();
        record.accounts.insert(
            "github".into(),
            AccountEntry::Detailed {
                handle: "verified".into(),
                status: AccountStatus::Confirmed,
                root: true,
            },
        );

        let candidates = vec![candidate("github", "impostor"), candidate("reddit", "jdoe")];
        let (updated, report) = apply_candidates(record, &candidates);

        assert_eq!(report.applied, vec!["reddit".to_string()]);
        assert_eq!(report.skipped, vec!["github".to_string()]);
        // the root entry is untouched
        assert_eq!(updated.accounts["github"].handle(), "verified");
        assert!(updated.accounts["github"].is_root());
        // the new entry arrives unconfirmed and non-root
        let added = &updated.accounts["reddit"];
        assert_eq!(added.handle(), "jdoe");
        assert!(!added.is_root());
    }

    #[test]
    fn apply_on_empty_registry_adds_everything() {
        let candidates = vec![candidate("github", "jdoe"), candidate("reddit", "jdoe")];
        let (updated, report) = apply_candidates(AccountRecord::new(), &candidates);
        assert_eq!(report.applied.len(), 2);
        assert!(report.skipped.is_empty());
        assert_eq!(updated.accounts.len(), 2);
    }
}
