//! Key set comparison between a working env file and its template.

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::parse::EnvFile;

/// Keys that differ between a working file and its template, both sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyDiff {
  /// Keys defined by the template but not by the working file.
  pub missing: Vec<String>,
  /// Keys defined by the working file but not by the template. Always empty
  /// unless orphan checking was requested.
  pub orphaned: Vec<String>,
}

impl KeyDiff {
  pub fn between(local: &EnvFile, template: &EnvFile, check_orphans: bool) -> Self {
    let local_keys = local.keys();
    let template_keys = template.keys();

    let missing: Vec<String> = template_keys
      .difference(&local_keys)
      .map(|key| key.to_string())
      .collect();

    let orphaned: Vec<String> = if check_orphans {
      local_keys
        .difference(&template_keys)
        .map(|key| key.to_string())
        .collect()
    } else {
      Vec::new()
    };

    #[cfg(feature = "tracing")]
    debug!(
      missing = missing.len(),
      orphaned = orphaned.len(),
      check_orphans,
      "Computed key diff"
    );

    Self { missing, orphaned }
  }

  pub fn is_in_sync(&self) -> bool {
    self.missing.is_empty() && self.orphaned.is_empty()
  }
}
