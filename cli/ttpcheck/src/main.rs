//! ttpcheck: validate Table Type Patterns and fit flow rules against them.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use manifest::CheckManifest;

#[derive(Parser)]
#[command(name = "ttpcheck", version, about = "Table Type Pattern checker")]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, resolve and validate a pattern document
    Validate {
        /// Pattern document (JSON)
        document: PathBuf,
        /// Validation profile (lenient, standard, strict)
        #[arg(long)]
        profile: Option<String>,
        /// Report format (human, json)
        #[arg(long)]
        format: Option<String>,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Treat warnings as errors
        #[arg(long)]
        warnings_as_errors: bool,
    },
    /// Check candidate flow rules against a pattern
    Fit {
        /// Pattern document (JSON)
        document: PathBuf,
        /// Candidate rules (a JSON rule object or array)
        rules: PathBuf,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Summarize the resolved pattern
    Inspect {
        /// Pattern document (JSON)
        document: PathBuf,
        /// Output format (human, json)
        #[arg(long)]
        format: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest = load_manifest_optional(&cwd)?;
    let manifest = manifest.as_ref();

    match cli.command {
        Commands::Validate {
            document,
            profile,
            format,
            output,
            warnings_as_errors,
        } => commands::validate::run(
            &document,
            manifest,
            profile.as_deref(),
            format.as_deref(),
            output.as_deref(),
            warnings_as_errors,
        ),
        Commands::Fit {
            document,
            rules,
            format,
        } => commands::fit::run(&document, &rules, manifest, format.as_deref()),
        Commands::Inspect { document, format } => {
            commands::inspect::run(&document, manifest, format.as_deref())
        }
    }
}

fn load_manifest_optional(cwd: &Path) -> anyhow::Result<Option<CheckManifest>> {
    match CheckManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => {
            tracing::debug!(dir = %dir.display(), "using ttpcheck.toml");
            Ok(Some(manifest))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_subcommands() {
        let cli = Cli::try_parse_from([
            "ttpcheck", "-vv", "validate", "p.json", "--profile", "strict", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Validate { document, profile, format, output, warnings_as_errors } => {
                assert_eq!(document, PathBuf::from("p.json"));
                assert_eq!(profile.as_deref(), Some("strict"));
                assert_eq!(format.as_deref(), Some("json"));
                assert!(output.is_none());
                assert!(!warnings_as_errors);
            }
            _ => panic!("expected validate"),
        }

        let cli = Cli::try_parse_from(["ttpcheck", "fit", "p.json", "rules.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Fit { .. }));
        assert!(Cli::try_parse_from(["ttpcheck", "fit", "p.json"]).is_err());
    }
}
