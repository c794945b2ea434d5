//! Template bootstrapping from an existing env file.

use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::info;

use crate::sync::{self, EnvSync, EnvSyncError};

/// Writes a template at `template_file` listing every key of `env_file`
/// with an empty value, in order of first appearance.
///
/// A missing `env_file` produces an empty template. Returns the keys written.
/// Failures are reported as [`EnvSyncError::Bootstrap`] naming the template.
pub fn create_template(env_file: &Path, template_file: &Path) -> Result<Vec<String>, EnvSyncError> {
  write_template(env_file, template_file).map_err(|source| EnvSyncError::Bootstrap {
    path: template_file.to_path_buf(),
    source: Box::new(source),
  })
}

fn write_template(env_file: &Path, template_file: &Path) -> Result<Vec<String>, EnvSyncError> {
  let keys: Vec<String> = if env_file.exists() {
    EnvSync::parse_file(env_file)?
      .ordered_keys()
      .into_iter()
      .map(str::to_string)
      .collect()
  } else {
    Vec::new()
  };

  let content: String = keys.iter().map(|key| format!("{key}=\n")).collect();

  let staged = sync::stage(template_file, &content)?;
  sync::commit(staged, template_file)?;

  #[cfg(feature = "tracing")]
  info!(
    "Created template {:?} with {} key(s)",
    template_file,
    keys.len()
  );

  Ok(keys)
}
