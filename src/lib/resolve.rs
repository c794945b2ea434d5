//! Template path resolution.

use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::debug;

/// Template file names searched next to the working file, in order.
pub const TEMPLATE_CANDIDATES: [&str; 2] = [".env.example", "example.env"];

/// File name used for the template when none of the candidates exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExampleName {
  #[default]
  #[value(name = ".env.example")]
  DotEnvExample,
  #[value(name = "example.env")]
  ExampleEnv,
}

impl ExampleName {
  pub fn file_name(self) -> &'static str {
    match self {
      ExampleName::DotEnvExample => TEMPLATE_CANDIDATES[0],
      ExampleName::ExampleEnv => TEMPLATE_CANDIDATES[1],
    }
  }
}

/// Picks the template for `env_file`.
///
/// An explicit path always wins, even when it does not exist. Otherwise the
/// first existing candidate in the working file's directory is used, falling
/// back to `fallback` in that directory.
pub fn resolve_template_path(
  env_file: &Path,
  explicit: Option<&Path>,
  fallback: ExampleName,
) -> PathBuf {
  if let Some(path) = explicit {
    return path.to_path_buf();
  }

  let dir = parent_dir(env_file);
  let resolved = TEMPLATE_CANDIDATES
    .iter()
    .map(|name| dir.join(name))
    .find(|candidate| candidate.exists())
    .unwrap_or_else(|| dir.join(fallback.file_name()));

  #[cfg(feature = "tracing")]
  debug!(?env_file, ?resolved, "Resolved template path");

  resolved
}

/// Directory containing `path`, `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> &Path {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  }
}
