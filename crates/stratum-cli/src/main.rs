//! Stratum CLI - compose Kubernetes manifests from layered kustomizations

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

use commands::build::{BuildArgs, ReleaseArgs};

#[derive(Parser)]
#[command(name = "stratum")]
#[command(author = "Stratum Contributors")]
#[command(version)]
#[command(about = "Compose Kubernetes manifests from layered kustomizations", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a kustomization tree into one resource stream
    Build {
        /// Kustomization directory or manifest file
        /// (default: the project's kustomization directory)
        path: Option<PathBuf>,

        /// Project root holding .stratum.yaml
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Overlay below the project's kustomization directory
        #[arg(short, long, conflicts_with = "path")]
        env: Option<String>,

        /// Output file (if not set, outputs to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        release: ReleaseArgs,
    },

    /// List registered plugins
    Plugins,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|env| EnvFilter::from_str(&env).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            std::process::exit(code);
        }
    };

    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Build {
            path,
            project,
            env,
            output,
            release,
        } => commands::build::run(&BuildArgs {
            path,
            project,
            env,
            output,
            release,
        }),

        Commands::Plugins => commands::plugins::run(),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
