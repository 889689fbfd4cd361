//! rxweave command-line tool
//!
//! Analyzes reactive class declarations and materializes the generated
//! members either as C# source or as patch modules.

use clap::{ArgAction, Parser, Subcommand};
use rxweave_cli::commands::{self, Session};
use rxweave_cli::config::{Backend, Config};
use rxweave_cli::output::{resolve_color_choice, Format, StyledOutput};
use rxweave_cli::pipeline::discover_inputs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rxweave")]
#[command(about = "Reactive property compiler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./rxweave.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Diagnostic output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    format: Format,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    /// More log output (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze declarations and print diagnostics
    Check {
        /// Declaration files or glob patterns
        inputs: Vec<String>,
    },

    /// Generate C# partial classes
    Generate {
        /// Declaration files or glob patterns
        inputs: Vec<String>,
        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Rewrite outputs even when unchanged
        #[arg(long)]
        force: bool,
    },

    /// Generate patch modules
    Patch {
        /// Declaration files or glob patterns
        inputs: Vec<String>,
        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Print instruction listings instead of writing files
        #[arg(long)]
        dump: bool,
        /// Rewrite outputs even when unchanged
        #[arg(long)]
        force: bool,
    },

    /// Generate with the back-end selected in the configuration file
    Build {
        /// Declaration files or glob patterns
        inputs: Vec<String>,
        /// Output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("rxweave={}", level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether diagnostics contained errors.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = Config::load(cli.config.as_deref())?;
    let conventions = config.conventions();
    let mut session = Session {
        out: StyledOutput::new(resolve_color_choice(cli.color.as_deref()), cli.quiet),
        format: cli.format,
        jobs: cli.jobs.unwrap_or_else(num_cpus::get),
    };

    let patterns = |inputs: Vec<String>| {
        if inputs.is_empty() {
            config.project.inputs.clone()
        } else {
            inputs
        }
    };
    let out_dir = |flag: Option<PathBuf>| flag.unwrap_or_else(|| config.project.out_dir.clone());
    let skip_unchanged = |force: bool| config.emit.skip_unchanged && !force;

    let failed = match cli.command {
        Commands::Check { inputs } => {
            let inputs = discover_inputs(&patterns(inputs))?;
            commands::check::execute(&mut session, &inputs, &conventions)?
        }
        Commands::Generate { inputs, out_dir: dir, force } => {
            let inputs = discover_inputs(&patterns(inputs))?;
            commands::generate::execute(&mut session, &inputs, &conventions, &out_dir(dir), skip_unchanged(force))?
        }
        Commands::Patch {
            inputs,
            out_dir: dir,
            dump,
            force,
        } => {
            let inputs = discover_inputs(&patterns(inputs))?;
            commands::patch::execute(
                &mut session,
                &inputs,
                &conventions,
                &out_dir(dir),
                skip_unchanged(force),
                dump,
            )?
        }
        Commands::Build { inputs, out_dir: dir } => {
            let inputs = discover_inputs(&patterns(inputs))?;
            let dir = out_dir(dir);
            match config.emit.backend {
                Backend::Source => {
                    commands::generate::execute(&mut session, &inputs, &conventions, &dir, skip_unchanged(false))?
                }
                Backend::Patch => {
                    commands::patch::execute(&mut session, &inputs, &conventions, &dir, skip_unchanged(false), false)?
                }
            }
        }
    };
    session.out.flush();
    Ok(failed)
}
