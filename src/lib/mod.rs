//! Environment file synchronization library.
//!
//! This library keeps a project's `.env` file in step with the template that
//! lists the keys it is expected to define (`.env.example` or `example.env`).
//! Keys the working file lacks are appended with the template's default value;
//! everything already in the working file is preserved byte for byte.
//!
//! # Features
//!
//! - **Line-preserving parsing**: every physical line keeps its raw text, so
//!   untouched lines are written back exactly as they were read
//! - **Append-only sync**: existing keys are never modified, even when their
//!   values differ from the template
//! - **Safe writes**: new content is staged in a temp file and renamed over the
//!   working file after a timestamped backup is taken
//! - **Orphan detection**: optionally lists keys the template no longer defines
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use doteq::report::{Report, ReportFormat};
//! use doteq::sync::{EnvSync, EnvSyncOptions};
//! use std::path::PathBuf;
//!
//! let options = EnvSyncOptions {
//!     env_file: PathBuf::from(".env"),
//!     template_file: PathBuf::from(".env.example"),
//!     check_orphans: false,
//!     dry_run: true,
//! };
//!
//! let outcome = EnvSync::sync_with_options(options).unwrap();
//! println!("{}", Report::new(&outcome, ReportFormat::Human));
//! ```

pub mod bootstrap;
pub mod diff;
pub mod parse;
pub mod report;
pub mod resolve;
pub mod sync;
