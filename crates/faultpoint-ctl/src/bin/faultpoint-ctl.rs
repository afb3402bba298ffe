//! CLI for driving fault groups against the demo workload.
//!
//! # Usage
//!
//! ```bash
//! # List the demo fault points and their addresses
//! faultpoint-ctl list
//!
//! # Run control commands from a file (or stdin without --script)
//! faultpoint-ctl run --script faults.txt
//!
//! # Apply a JSON fault plan, drive the workload, print the report
//! faultpoint-ctl plan --file plan.json --iterations 1000 --seed 7
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` to see every
//! firing.

use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use faultpoint_core::{load_plan, FaultInjector, InjectorConfig, PanicMode};
use faultpoint_ctl::demo::{quiet_panics, BlockStore};
use faultpoint_ctl::report::{format_listing, format_report};
use faultpoint_ctl::script::ScriptRunner;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faultpoint-ctl")]
#[command(about = "Configure fault groups and drive an instrumented workload")]
#[command(version)]
struct Cli {
    /// Seed for probability rolls (default: the plan's seed, else 42).
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// What an injected panic does.
    #[arg(long, value_enum, default_value = "unwind", global = true)]
    panic_mode: PanicArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered fault points.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run control commands, one per line.
    Run {
        /// Script file; stdin when omitted.
        #[arg(long)]
        script: Option<PathBuf>,

        /// Print one JSON object per command.
        #[arg(long)]
        json: bool,
    },

    /// Apply a fault plan and drive the workload.
    Plan {
        /// JSON fault plan.
        #[arg(short, long)]
        file: PathBuf,

        /// Workload iterations.
        #[arg(short, long, default_value = "100")]
        iterations: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PanicArg {
    Unwind,
    Abort,
}

impl From<PanicArg> for PanicMode {
    fn from(arg: PanicArg) -> Self {
        match arg {
            PanicArg::Unwind => PanicMode::Unwind,
            PanicArg::Abort => PanicMode::Abort,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = |plan_seed: Option<u64>| InjectorConfig {
        seed: cli
            .seed
            .or(plan_seed)
            .unwrap_or(InjectorConfig::default().seed),
        panic_mode: cli.panic_mode.into(),
    };

    let code = match &cli.command {
        Commands::List { json } => cmd_list(config(None), *json),
        Commands::Run { script, json } => cmd_run(config(None), script.as_ref(), *json),
        Commands::Plan { file, iterations } => cmd_plan(&config, file, *iterations),
    };
    std::process::exit(code);
}

fn setup(config: InjectorConfig) -> (FaultInjector, BlockStore) {
    let injector = FaultInjector::new(config);
    match BlockStore::new(&injector) {
        Ok(store) => (injector, store),
        Err(e) => {
            eprintln!("Error: failed to register demo fault points: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_list(config: InjectorConfig, json: bool) -> i32 {
    let (injector, _store) = setup(config);
    let rows: Vec<_> = injector.list_fault_points().collect();
    if json {
        match serde_json::to_string_pretty(&rows) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return 1;
            }
        }
    } else {
        print!("{}", format_listing(&rows));
    }
    0
}

fn cmd_run(config: InjectorConfig, script: Option<&PathBuf>, json: bool) -> i32 {
    let (injector, store) = setup(config);
    quiet_panics();
    let runner = ScriptRunner::new(&injector, &store, json);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match script {
        Some(path) => match File::open(path) {
            Ok(file) => runner.run(BufReader::new(file), &mut out),
            Err(e) => {
                eprintln!("Error: cannot open script {}: {e}", path.display());
                return 1;
            }
        },
        None => runner.run(io::stdin().lock(), &mut out),
    };

    match result {
        Ok(summary) if summary.failures == 0 => 0,
        Ok(summary) => {
            eprintln!(
                "{} of {} commands failed",
                summary.failures, summary.commands
            );
            1
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_plan(
    config: &dyn Fn(Option<u64>) -> InjectorConfig,
    file: &PathBuf,
    iterations: u64,
) -> i32 {
    let plan = match load_plan(file) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: cannot load plan {}: {e}", file.display());
            return 1;
        }
    };

    let (injector, store) = setup(config(plan.seed));
    if let Err(e) = injector.apply_plan(&plan) {
        eprintln!("Error: plan rejected: {e}");
        return 1;
    }

    quiet_panics();
    let summary = store.drive(iterations);
    print!("{}", format_report(&injector.report(), Some(&summary)));
    0
}
