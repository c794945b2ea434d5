//! Environment file synchronization functionality.
//!
//! This module keeps a working env file up to date with a template by
//! appending the keys it is missing. Existing content is never rewritten.
//!
//! # Sync Logic
//!
//! The sync process:
//! 1. Parses the template and the working file (a missing `.env` counts as empty)
//! 2. Computes the keys missing from the working file, and the orphaned keys
//!    when requested
//! 3. Unless this is a dry run:
//!    - Copies every original line verbatim, adding a newline to an
//!      unterminated last line
//!    - Appends `KEY=value` per missing key, sorted, using the template's value
//!    - Stages the result in a temp file next to the working file, backs the
//!      working file up to `<path>.bak.<YYYYMMDD-HHMMSS>`, then renames the
//!      temp file over it
//!
//! # Examples
//!
//! ```rust,no_run
//! use doteq::sync::{EnvSync, EnvSyncOptions};
//! use std::path::PathBuf;
//!
//! let options = EnvSyncOptions {
//!     env_file: PathBuf::from(".env"),
//!     template_file: PathBuf::from(".env.example"),
//!     check_orphans: true,
//!     dry_run: false,
//! };
//!
//! let outcome = EnvSync::sync_with_options(options).unwrap();
//! println!("added {:?}", outcome.added_keys);
//! ```

use std::{
  ffi::OsString,
  fs,
  io::{self, Write},
  path::{Path, PathBuf},
};

use chrono::Local;
use tempfile::NamedTempFile;
#[cfg(feature = "tracing")]
use tracing::{debug, info, trace};

use crate::diff::KeyDiff;
use crate::parse::{EnvFile, ParseError};
use crate::resolve::parent_dir;

/// Name of a working file that is allowed not to exist yet.
pub const DEFAULT_LOCAL_FILENAME: &str = ".env";

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Main synchronization service for environment files.
pub struct EnvSync;

impl EnvSync {
  /// Synchronizes environment files using the provided options.
  ///
  /// The working file is created if it doesn't exist. Returns an error if the
  /// template file doesn't exist. On error the working file is left untouched.
  pub fn sync_with_options(options: EnvSyncOptions) -> Result<SyncOutcome, EnvSyncError> {
    #[cfg(feature = "tracing")]
    info!("Starting env sync");

    let EnvSyncOptions {
      env_file,
      template_file,
      check_orphans,
      dry_run,
    } = options;

    #[cfg(feature = "tracing")]
    debug!(?env_file, ?template_file, check_orphans, dry_run, "Resolved options");

    let template = Self::parse_file(&template_file)?;
    let local = Self::parse_file(&env_file)?;

    let KeyDiff { missing, orphaned } = KeyDiff::between(&local, &template, check_orphans);

    let mut outcome = SyncOutcome {
      existing_keys: local.assignments().count(),
      added_keys: missing,
      orphaned_keys: orphaned,
      dry_run,
      backup_file: None,
      env_file,
    };

    if dry_run {
      #[cfg(feature = "tracing")]
      info!(
        "Dry run: {} key(s) would be added, nothing written",
        outcome.added_keys.len()
      );
      return Ok(outcome);
    }

    let content = Self::sync(&local, &template, &outcome.added_keys);
    outcome.backup_file = Self::update_local(&content, &outcome.env_file)?;

    Ok(outcome)
  }

  /// Reads and parses an env file.
  ///
  /// A missing file named `.env` yields an empty [`EnvFile`]; any other
  /// missing file is [`EnvSyncError::NotFound`].
  pub fn parse_file(path: &Path) -> Result<EnvFile<'static>, EnvSyncError> {
    #[cfg(feature = "tracing")]
    debug!("Reading {:?}", path);

    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        if path
          .file_name()
          .is_some_and(|name| name == DEFAULT_LOCAL_FILENAME)
        {
          #[cfg(feature = "tracing")]
          debug!("{:?} does not exist yet, treating it as empty", path);
          return Ok(EnvFile::default());
        }
        return Err(EnvSyncError::NotFound(path.to_path_buf()));
      }
      Err(err) => return Err(EnvSyncError::io(path, err)),
    };

    let parsed = EnvFile::try_from(content.as_str()).map_err(|source| EnvSyncError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    Ok(parsed.into_owned())
  }

  /// Renders the working file with `missing` keys appended.
  fn sync(local: &EnvFile, template: &EnvFile, missing: &[String]) -> String {
    #[cfg(feature = "tracing")]
    debug!("Appending {} key(s)", missing.len());

    let mut content = local.to_string();
    if !local.ends_with_newline() {
      content.push('\n');
    }

    for key in missing {
      let value = template.value_of(key).unwrap_or_default();

      #[cfg(feature = "tracing")]
      trace!("Appending {}={}", key, value);

      content.push_str(key);
      content.push('=');
      content.push_str(value);
      content.push('\n');
    }

    content
  }

  /// Atomically replaces the working file, backing up the previous version.
  fn update_local(content: &str, local_path: &Path) -> Result<Option<PathBuf>, EnvSyncError> {
    #[cfg(feature = "tracing")]
    debug!("Writing synced content to {:?}", local_path);

    let staged = stage(local_path, content)?;
    let backup = backup_file(local_path)?;
    commit(staged, local_path)?;

    #[cfg(feature = "tracing")]
    info!("Sync completed successfully");

    Ok(backup)
  }
}

/// Writes `content` to a temp file in `path`'s directory, creating the
/// directory if needed. The temp file takes over `path`'s permissions when
/// `path` exists and is removed again if dropped before [`commit`].
pub(crate) fn stage(path: &Path, content: &str) -> Result<NamedTempFile, EnvSyncError> {
  let dir = parent_dir(path);
  fs::create_dir_all(dir).map_err(|err| EnvSyncError::io(dir, err))?;

  let mut staged = NamedTempFile::new_in(dir).map_err(|err| EnvSyncError::io(dir, err))?;

  #[cfg(feature = "tracing")]
  trace!("Staging content in {:?}", staged.path());

  staged
    .write_all(content.as_bytes())
    .and_then(|()| staged.as_file().sync_all())
    .map_err(|err| EnvSyncError::io(staged.path(), err))?;

  if let Ok(metadata) = fs::metadata(path) {
    fs::set_permissions(staged.path(), metadata.permissions())
      .map_err(|err| EnvSyncError::io(staged.path(), err))?;
  }

  Ok(staged)
}

/// Renames a staged temp file onto `path`.
pub(crate) fn commit(staged: NamedTempFile, path: &Path) -> Result<(), EnvSyncError> {
  staged
    .persist(path)
    .map(|_| ())
    .map_err(|err| EnvSyncError::io(path, err.error))
}

/// Copies `path` to `<path>.bak.<timestamp>` with owner-only permissions.
///
/// Returns `None` without doing anything if `path` does not exist.
pub fn backup_file(path: &Path) -> Result<Option<PathBuf>, EnvSyncError> {
  if !path.exists() {
    return Ok(None);
  }

  let backup_path = backup_path(path, &Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string());

  #[cfg(feature = "tracing")]
  debug!("Backing up {:?} to {:?}", path, backup_path);

  fs::copy(path, &backup_path).map_err(|err| EnvSyncError::io(&backup_path, err))?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(&backup_path, fs::Permissions::from_mode(0o600))
      .map_err(|err| EnvSyncError::io(&backup_path, err))?;
  }

  Ok(Some(backup_path))
}

fn backup_path(path: &Path, timestamp: &str) -> PathBuf {
  let mut name = OsString::from(path.as_os_str());
  name.push(".bak.");
  name.push(timestamp);
  PathBuf::from(name)
}

/// Errors that can occur during environment file synchronization.
#[derive(Debug, thiserror::Error)]
pub enum EnvSyncError {
  /// A required file (usually the template) does not exist
  #[error("Missing required file: {}", .0.display())]
  NotFound(PathBuf),
  /// A file failed syntax validation
  #[error("Failed to parse {}: {source}", .path.display())]
  Parse { path: PathBuf, source: ParseError },
  /// The filesystem refused access while reading, backing up or replacing
  #[error("Permission denied: {}: {source}", .path.display())]
  PermissionDenied { path: PathBuf, source: io::Error },
  /// Any other read or write failure
  #[error("IO error on {}: {source}", .path.display())]
  Io { path: PathBuf, source: io::Error },
  /// Writing a template from the working file failed
  #[error("Failed to create example file at {}: {source}", .path.display())]
  Bootstrap {
    path: PathBuf,
    source: Box<EnvSyncError>,
  },
}

impl EnvSyncError {
  fn io(path: &Path, source: io::Error) -> Self {
    let path = path.to_path_buf();
    if source.kind() == io::ErrorKind::PermissionDenied {
      EnvSyncError::PermissionDenied { path, source }
    } else {
      EnvSyncError::Io { path, source }
    }
  }
}

/// Configuration options for environment file synchronization.
#[derive(Debug, Clone)]
pub struct EnvSyncOptions {
  /// Path to the working environment file.
  pub env_file: PathBuf,
  /// Path to the template file listing the expected keys.
  pub template_file: PathBuf,
  /// Also report keys present in the working file but not in the template.
  pub check_orphans: bool,
  /// Compute the changes without writing anything.
  pub dry_run: bool,
}

impl Default for EnvSyncOptions {
  fn default() -> Self {
    Self {
      env_file: PathBuf::from(DEFAULT_LOCAL_FILENAME),
      template_file: PathBuf::from(crate::resolve::TEMPLATE_CANDIDATES[0]),
      check_orphans: false,
      dry_run: false,
    }
  }
}

/// What a sync run did, or would do for a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
  pub env_file: PathBuf,
  /// Keys appended to the working file, sorted.
  pub added_keys: Vec<String>,
  /// Number of key-bearing lines the working file already had.
  pub existing_keys: usize,
  /// Sorted orphaned keys; empty unless orphan checking was enabled.
  pub orphaned_keys: Vec<String>,
  pub dry_run: bool,
  pub backup_file: Option<PathBuf>,
}

impl SyncOutcome {
  pub fn changes_count(&self) -> usize {
    self.added_keys.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn options(temp_dir: &TempDir) -> EnvSyncOptions {
    EnvSyncOptions {
      env_file: temp_dir.path().join(".env"),
      template_file: temp_dir.path().join(".env.example"),
      ..EnvSyncOptions::default()
    }
  }

  #[test]
  fn test_sync() {
    let local: EnvFile = "# Comment for KEY1\nKEY1=value1\nKEY2=value2 # inline comment\n"
      .try_into()
      .unwrap();
    let template: EnvFile = "KEY1=\nKEY2=template_value\nKEY4=new_key\nKEY3=\n"
      .try_into()
      .unwrap();
    let missing = KeyDiff::between(&local, &template, false).missing;

    let synced = EnvSync::sync(&local, &template, &missing);

    assert_eq!(
      synced,
      "# Comment for KEY1\nKEY1=value1\nKEY2=value2 # inline comment\nKEY3=\nKEY4=new_key\n"
    );
  }

  #[test]
  fn test_sync_terminates_last_line_before_appending() {
    let local: EnvFile = "EXISTING=value".try_into().unwrap();
    let template: EnvFile = "NEW_KEY=123".try_into().unwrap();

    let synced = EnvSync::sync(&local, &template, &["NEW_KEY".to_string()]);

    assert_eq!(synced, "EXISTING=value\nNEW_KEY=123\n");
  }

  #[test]
  fn test_sync_without_missing_keys_terminates_last_line() {
    let local: EnvFile = "A=1\n\n# trailing".try_into().unwrap();
    let template: EnvFile = "A=2\n".try_into().unwrap();

    assert_eq!(EnvSync::sync(&local, &template, &[]), "A=1\n\n# trailing\n");
  }

  #[test]
  fn test_sync_without_missing_keys_keeps_terminated_file() {
    let local: EnvFile = "A=1\n".try_into().unwrap();
    let template: EnvFile = "A=2\n".try_into().unwrap();

    assert_eq!(EnvSync::sync(&local, &template, &[]), "A=1\n");
  }

  #[test]
  fn test_sync_uses_template_value_without_comment() {
    let local = EnvFile::default();
    let template: EnvFile = "PORT=5432 # default postgres port\nexport MODE=dev\n"
      .try_into()
      .unwrap();
    let missing = KeyDiff::between(&local, &template, false).missing;

    let synced = EnvSync::sync(&local, &template, &missing);

    assert_eq!(synced, "MODE=dev\nPORT=5432\n");
  }

  #[test]
  fn test_template_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let options = EnvSyncOptions {
      template_file: temp_dir.path().join("nonexistent.env.template"),
      ..options(&temp_dir)
    };

    match EnvSync::sync_with_options(options).unwrap_err() {
      EnvSyncError::NotFound(path) => {
        assert_eq!(path, temp_dir.path().join("nonexistent.env.template"));
      }
      err => panic!("Expected NotFound error, got {err:?}"),
    }
    assert!(!temp_dir.path().join(".env").exists());
  }

  #[test]
  fn test_missing_dot_env_is_empty() {
    let temp_dir = TempDir::new().unwrap();

    let env = EnvSync::parse_file(&temp_dir.path().join(".env")).unwrap();
    assert!(env.lines.is_empty());

    let err = EnvSync::parse_file(&temp_dir.path().join(".env.local")).unwrap_err();
    assert!(matches!(err, EnvSyncError::NotFound(_)));
  }

  #[test]
  fn test_parse_error_names_file_and_line() {
    let temp_dir = TempDir::new().unwrap();
    let options = options(&temp_dir);
    fs::write(&options.env_file, "GOOD=1\nBAD\n").unwrap();
    fs::write(&options.template_file, "GOOD=\nNEW=\n").unwrap();

    let err = EnvSync::sync_with_options(options.clone()).unwrap_err();

    match &err {
      EnvSyncError::Parse { path, source } => {
        assert_eq!(path, &options.env_file);
        assert_eq!(source.line(), 2);
      }
      err => panic!("Expected Parse error, got {err:?}"),
    }
    assert!(err.to_string().contains("Syntax error on line 2"));
    assert_eq!(fs::read_to_string(&options.env_file).unwrap(), "GOOD=1\nBAD\n");
  }

  #[test]
  fn test_existing_keys_counts_every_definition() {
    let temp_dir = TempDir::new().unwrap();
    let options = EnvSyncOptions {
      dry_run: true,
      ..options(&temp_dir)
    };
    fs::write(&options.env_file, "A=1\nA=2\n# B=3\nexport BARE\n").unwrap();
    fs::write(&options.template_file, "A=\n").unwrap();

    let outcome = EnvSync::sync_with_options(options).unwrap();

    assert_eq!(outcome.existing_keys, 2);
    assert!(outcome.added_keys.is_empty());
  }

  #[test]
  fn test_creates_missing_env_file_without_backup() {
    let temp_dir = TempDir::new().unwrap();
    let options = options(&temp_dir);
    fs::write(&options.template_file, "B=2\nA=1\n").unwrap();

    let outcome = EnvSync::sync_with_options(options.clone()).unwrap();

    assert_eq!(outcome.added_keys, vec!["A", "B"]);
    assert_eq!(outcome.existing_keys, 0);
    assert!(outcome.backup_file.is_none());
    assert_eq!(fs::read_to_string(&options.env_file).unwrap(), "A=1\nB=2\n");
  }

  #[test]
  fn test_backup_keeps_previous_content() {
    let temp_dir = TempDir::new().unwrap();
    let options = options(&temp_dir);
    fs::write(&options.env_file, "A=local\n").unwrap();
    fs::write(&options.template_file, "A=\nB=\n").unwrap();

    let outcome = EnvSync::sync_with_options(options.clone()).unwrap();
    let backup = outcome.backup_file.expect("backup should be created");

    let name = backup.file_name().unwrap().to_string_lossy().into_owned();
    let timestamp = name.strip_prefix(".env.bak.").unwrap();
    assert_eq!(timestamp.len(), "YYYYMMDD-HHMMSS".len());
    assert_eq!(timestamp.as_bytes()[8], b'-');
    assert!(timestamp.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit()));

    assert_eq!(fs::read_to_string(&backup).unwrap(), "A=local\n");
    assert_eq!(fs::read_to_string(&options.env_file).unwrap(), "A=local\nB=\n");

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      let mode = fs::metadata(&backup).unwrap().permissions().mode();
      assert_eq!(mode & 0o777, 0o600);
    }
  }

  #[test]
  fn test_backup_path_format() {
    assert_eq!(
      backup_path(Path::new("app/.env"), "20240102-030405"),
      PathBuf::from("app/.env.bak.20240102-030405")
    );
  }

  #[test]
  fn test_no_temp_files_left_behind() {
    let temp_dir = TempDir::new().unwrap();
    let options = options(&temp_dir);
    fs::write(&options.template_file, "A=1\n").unwrap();

    EnvSync::sync_with_options(options).unwrap();

    let mut names: Vec<String> = fs::read_dir(temp_dir.path())
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    names.sort();
    assert_eq!(names, vec![".env", ".env.example"]);
  }

  #[cfg(unix)]
  #[test]
  fn test_rewrite_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let options = options(&temp_dir);
    fs::write(&options.env_file, "A=1\n").unwrap();
    fs::set_permissions(&options.env_file, fs::Permissions::from_mode(0o640)).unwrap();
    fs::write(&options.template_file, "A=\nB=\n").unwrap();

    EnvSync::sync_with_options(options.clone()).unwrap();

    let mode = fs::metadata(&options.env_file).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o640);
  }

  #[test]
  fn test_io_error_classification() {
    let denied = EnvSyncError::io(
      Path::new(".env"),
      io::Error::from(io::ErrorKind::PermissionDenied),
    );
    assert!(matches!(denied, EnvSyncError::PermissionDenied { .. }));

    let other = EnvSyncError::io(Path::new(".env"), io::Error::other("disk full"));
    assert!(matches!(other, EnvSyncError::Io { .. }));
    assert!(other.to_string().contains("disk full"));
  }
}
