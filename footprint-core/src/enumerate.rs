//! Enumeration producer port and its subprocess adapter.
//!
//! The enumeration tool itself is an external collaborator; all the engine
//! sees is an opaque producer of a platform-label -> finding map.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use footprint_model::{FindingStatus, PlatformFinding};

#[async_trait]
pub trait UsernameEnumerator: Send + Sync {
    /// Probe platforms for `subject` and return findings in the producer's
    /// reporting order. `site_filter` restricts the probe to the named
    /// platforms; `timeout` is the per-site probe budget.
    async fn enumerate(
        &self,
        subject: &str,
        site_filter: Option<&[String]>,
        timeout: Duration,
    ) -> anyhow::Result<Vec<PlatformFinding>>;
}

/// Convert a producer result object (`label -> entry`) into ordered
/// findings.
///
/// Lenient by design: entries are untrusted. An entry with a recognizable
/// claimed URL but no status string is treated as claimed, matching how the
/// producers report positives; anything unrecognizable becomes `Unknown`
/// with no URL, which reconciliation later ignores.
pub fn findings_from_json(value: &Value) -> Vec<PlatformFinding> {
    let Some(object) = value.as_object() else {
        return Vec::new();
    };

    object
        .iter()
        .map(|(label, entry)| finding_from_entry(label, entry))
        .collect()
}

fn finding_from_entry(label: &str, entry: &Value) -> PlatformFinding {
    let claimed_url = ["url_user", "claimed_url", "url"]
        .iter()
        .find_map(|key| entry.get(*key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_owned);

    let status = match entry
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("claimed") => FindingStatus::Claimed,
        Some("available") | Some("not_found") | Some("notfound") => FindingStatus::NotFound,
        Some(_) => FindingStatus::Unknown,
        None if claimed_url.is_some() => FindingStatus::Claimed,
        None => FindingStatus::Unknown,
    };

    let observed_handle = ["username", "handle"]
        .iter()
        .find_map(|key| entry.get(*key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|handle| !handle.is_empty())
        .map(str::to_owned);

    PlatformFinding {
        platform_label: label.to_owned(),
        status,
        claimed_url,
        observed_handle,
    }
}

/// Runs the configured enumeration command as a subprocess.
///
/// Contract: the command receives `--timeout <secs>`, one `--site <name>`
/// per filter entry, and the subject as the final argument; it prints a
/// JSON object mapping platform labels to result entries on stdout.
#[derive(Debug, Clone)]
pub struct CommandEnumerator {
    program: String,
    base_args: Vec<String>,
}

impl CommandEnumerator {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }
}

#[async_trait]
impl UsernameEnumerator for CommandEnumerator {
    async fn enumerate(
        &self,
        subject: &str,
        site_filter: Option<&[String]>,
        timeout: Duration,
    ) -> anyhow::Result<Vec<PlatformFinding>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .arg("--timeout")
            .arg(timeout.as_secs().to_string());
        for site in site_filter.unwrap_or_default() {
            command.arg("--site").arg(site);
        }
        command
            .arg(subject)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, %subject, "spawning enumeration command");
        let output = command
            .output()
            .await
            .with_context(|| format!("failed to spawn `{}`", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "enumeration command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let value: Value = serde_json::from_slice(&output.stdout)
            .context("enumeration command produced invalid JSON")?;
        let findings = findings_from_json(&value);
        info!(%subject, findings = findings.len(), "enumeration command finished");
        Ok(findings)
    }
}
