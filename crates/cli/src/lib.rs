mod handlers;
mod scan;

use clap::{Parser, Subcommand};
use loaderscope_core::ScanSpec;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loaderscope",
    version,
    about = "Discovers loader delegation order and classpath entries in a runtime heap",
    long_about = "Loaderscope walks the loader hierarchy captured in a heap snapshot, \
                  orders loaders parent-first and asks a vendor-specific handler for \
                  each loader's classpath entries."
)]
pub struct Cli {
    /// Also log to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover loader order and classpath entries from a heap snapshot
    #[command(
        long_about = "Loads a JSON heap snapshot, runs discovery from its root loaders and \
                            prints the loader order and the classpath. Flags override the \
                            settings read from --config."
    )]
    Scan {
        /// Path to the heap snapshot (JSON)
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Scan settings (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Leave loaders that are some other loader's parent out of the result
        #[arg(long)]
        ignore_parent_loaders: bool,

        /// Drop entries whose path does not exist
        #[arg(long)]
        skip_unreadable: bool,

        /// Keep entry paths as discovered instead of canonicalizing them
        #[arg(long)]
        no_canonicalize: bool,

        /// Process root loaders in parallel
        #[arg(long)]
        parallel: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the registered loader handlers
    Handlers,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = loaderscope_runtime::init_logging("cli", cli.verbose);

    match cli.command {
        Commands::Scan {
            snapshot,
            config,
            ignore_parent_loaders,
            skip_unreadable,
            no_canonicalize,
            parallel,
            json,
        } => {
            let mut spec = match config {
                Some(path) => ScanSpec::from_path(&path)?,
                None => ScanSpec::default(),
            };
            spec.ignore_parent_loaders |= ignore_parent_loaders;
            spec.skip_unreadable_entries |= skip_unreadable;
            if no_canonicalize {
                spec.canonicalize_entries = false;
            }
            scan::run(&snapshot, spec, parallel, json)
        }
        Commands::Handlers => handlers::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_flags_parse() {
        let cli = Cli::try_parse_from([
            "loaderscope",
            "scan",
            "heap.json",
            "--ignore-parent-loaders",
            "--no-canonicalize",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan {
                snapshot,
                ignore_parent_loaders,
                no_canonicalize,
                skip_unreadable,
                json,
                ..
            } => {
                assert_eq!(snapshot, PathBuf::from("heap.json"));
                assert!(ignore_parent_loaders && no_canonicalize && json);
                assert!(!skip_unreadable);
            }
            Commands::Handlers => panic!("expected scan"),
        }
    }

    #[test]
    fn test_scan_requires_a_snapshot() {
        assert!(Cli::try_parse_from(["loaderscope", "scan"]).is_err());
    }
}
