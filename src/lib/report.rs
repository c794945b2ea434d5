//! Rendering of sync results and errors.
//!
//! Two formats are supported: a short human-readable summary and a single
//! JSON object for automation (CI) contexts. The format is chosen by the
//! caller, see [`ReportFormat::detect`].

use std::{borrow::Cow, fmt};

use colored::Colorize;
use serde::Serialize;

use crate::sync::SyncOutcome;

/// Environment variables marking an automation context when set non-empty.
pub const CI_MARKER_VARS: [&str; 4] = ["GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE", "CIRCLECI"];

const PREVIEW_MESSAGE: &str = "Preview only - no changes applied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
  #[default]
  Human,
  Json,
}

impl ReportFormat {
  /// Picks [`ReportFormat::Json`] when `lookup` reports an automation
  /// context: `CI=true`, or any of [`CI_MARKER_VARS`] set to a non-empty value.
  pub fn detect<F>(lookup: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let ci = lookup("CI").is_some_and(|value| value == "true")
      || CI_MARKER_VARS
        .iter()
        .any(|&name| lookup(name).is_some_and(|value| !value.is_empty()));

    if ci {
      ReportFormat::Json
    } else {
      ReportFormat::Human
    }
  }
}

/// Renders a [`SyncOutcome`]. Dry-run outcomes render as a preview.
pub struct Report<'a> {
  outcome: &'a SyncOutcome,
  format: ReportFormat,
}

impl<'a> Report<'a> {
  pub fn new(outcome: &'a SyncOutcome, format: ReportFormat) -> Self {
    Self { outcome, format }
  }
}

#[derive(Serialize)]
struct SyncSummary<'a> {
  status: &'static str,
  added_keys: &'a [String],
  existing_keys: usize,
  orphaned_keys: &'a [String],
  changes_count: usize,
}

#[derive(Serialize)]
struct PreviewSummary<'a> {
  status: &'static str,
  message: &'static str,
  added_keys: &'a [String],
}

#[derive(Serialize)]
struct ErrorSummary<'a> {
  status: &'static str,
  message: Cow<'a, str>,
}

fn write_json<T: Serialize>(f: &mut fmt::Formatter<'_>, value: &T) -> fmt::Result {
  let json = serde_json::to_string(value).map_err(|_| fmt::Error)?;
  f.write_str(&json)
}

impl<'a> fmt::Display for Report<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let outcome = self.outcome;
    match (self.format, outcome.dry_run) {
      (ReportFormat::Json, false) => write_json(
        f,
        &SyncSummary {
          status: "success",
          added_keys: &outcome.added_keys,
          existing_keys: outcome.existing_keys,
          orphaned_keys: &outcome.orphaned_keys,
          changes_count: outcome.changes_count(),
        },
      ),
      (ReportFormat::Json, true) => write_json(
        f,
        &PreviewSummary {
          status: "dry-run",
          message: PREVIEW_MESSAGE,
          added_keys: &outcome.added_keys,
        },
      ),
      (ReportFormat::Human, false) => self.fmt_summary(f),
      (ReportFormat::Human, true) => self.fmt_preview(f),
    }
  }
}

impl<'a> Report<'a> {
  fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let outcome = self.outcome;
    let file_name = outcome
      .env_file
      .file_name()
      .map(|name| name.to_string_lossy())
      .unwrap_or_else(|| outcome.env_file.to_string_lossy());

    writeln!(f, "Doteq Report:")?;
    writeln!(
      f,
      "{} Added {} new keys to {}",
      "✓".green(),
      outcome.added_keys.len(),
      file_name
    )?;
    write!(
      f,
      "{} Preserved {} existing values",
      "✓".green(),
      outcome.existing_keys
    )?;
    self.fmt_orphans(f)?;

    if !outcome.added_keys.is_empty() {
      write!(f, "\n\nChanges made:")?;
      for key in &outcome.added_keys {
        write!(f, "\n  {} {} (added)", "+".green(), key)?;
      }
    }
    Ok(())
  }

  fn fmt_preview(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let outcome = self.outcome;

    writeln!(f, "Doteq Preview (--dry-run):")?;
    write!(
      f,
      "Would add {} keys to {}:",
      outcome.added_keys.len(),
      outcome.env_file.display()
    )?;
    for key in &outcome.added_keys {
      write!(f, "\n  {} {}=", "+".green(), key)?;
    }
    self.fmt_orphans(f)?;
    write!(f, "\n\nNo changes made. Run without --dry-run to apply changes.")
  }

  fn fmt_orphans(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let orphaned = &self.outcome.orphaned_keys;
    if orphaned.is_empty() {
      return Ok(());
    }
    write!(
      f,
      "\n{} Found {} orphaned key(s): {}",
      "⚠".yellow(),
      orphaned.len(),
      orphaned.join(", ")
    )
  }
}

/// Renders a failed run.
pub struct ErrorReport<'a> {
  error: &'a dyn std::error::Error,
  format: ReportFormat,
}

impl<'a> ErrorReport<'a> {
  pub fn new(error: &'a dyn std::error::Error, format: ReportFormat) -> Self {
    Self { error, format }
  }
}

impl<'a> fmt::Display for ErrorReport<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let message = self.error.to_string();
    match self.format {
      ReportFormat::Json => write_json(
        f,
        &ErrorSummary {
          status: "error",
          message: sanitize_for_ci(&message),
        },
      ),
      ReportFormat::Human => write!(f, "{}", format!("Error: {}", message).red()),
    }
  }
}

/// Collapses line breaks so a message fits on one log line.
pub fn sanitize_for_ci(text: &str) -> Cow<'_, str> {
  if text.contains(['\n', '\r']) {
    Cow::Owned(text.replace(['\n', '\r'], " "))
  } else {
    Cow::Borrowed(text)
  }
}
