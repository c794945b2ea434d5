use clap::Parser;
use doteq::bootstrap;
use doteq::report::{ErrorReport, Report, ReportFormat};
use doteq::resolve::{ExampleName, resolve_template_path};
use doteq::sync::{EnvSync, EnvSyncError, EnvSyncOptions, SyncOutcome};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
  name = "doteq",
  about = "Keep your .env file in sync with its .env.example template",
  version,
  author
)]
struct Cli {
  /// Path to the environment file
  #[arg(long, env = "DOTEQ_ENV_FILE", default_value = ".env")]
  env_file: PathBuf,

  /// Path to the example file (defaults: .env.example or example.env next to the env file)
  #[arg(long, env = "DOTEQ_EXAMPLE_FILE")]
  example_file: Option<PathBuf>,

  /// If the example file is missing, create it from the keys in --env-file with empty values
  #[arg(long)]
  create_example: bool,

  /// File name used when creating an example (ignored if --example-file is provided)
  #[arg(long, value_enum, default_value_t = ExampleName::DotEnvExample)]
  example_name: ExampleName,

  /// Warn about keys in the env file that the example file does not define
  #[arg(long)]
  check_orphans: bool,

  /// Show what would be changed without making changes
  #[arg(long)]
  dry_run: bool,

  /// Suppress non-error output
  #[arg(short, long, conflicts_with = "verbose")]
  quiet: bool,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn setup_tracing(verbose: u8, quiet: bool) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match (quiet, verbose) {
    (true, _) => "error",
    (false, 0) => "warn",
    (false, 1) => "info",
    (false, 2) => "debug",
    _ => "trace",
  };

  // stdout is reserved for the report.
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn run(cli: &Cli) -> Result<SyncOutcome, EnvSyncError> {
  let template_file = resolve_template_path(
    &cli.env_file,
    cli.example_file.as_deref(),
    cli.example_name,
  );

  if cli.create_example && !template_file.exists() {
    bootstrap::create_template(&cli.env_file, &template_file)?;
  }

  EnvSync::sync_with_options(EnvSyncOptions {
    env_file: cli.env_file.clone(),
    template_file,
    check_orphans: cli.check_orphans,
    dry_run: cli.dry_run,
  })
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  setup_tracing(cli.verbose, cli.quiet);

  let format = ReportFormat::detect(|name| std::env::var(name).ok());

  match run(&cli) {
    Ok(outcome) => {
      if format == ReportFormat::Json || !cli.quiet {
        println!("{}", Report::new(&outcome, format));
      }
      ExitCode::SUCCESS
    }
    Err(err) => {
      let report = ErrorReport::new(&err, format);
      match format {
        ReportFormat::Json => println!("{}", report),
        ReportFormat::Human => eprintln!("{}", report),
      }
      ExitCode::FAILURE
    }
  }
}
