//! distcc-cross CLI
//!
//! Entry point for the `distcc-cross` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use distcc_cross::config::{default_host_config_path, PROJECT_CONFIG_FILE};
use distcc_cross::distro::{Distro, Role};
use distcc_cross::host::SystemProcessRunner;
use distcc_cross::matrix::{BuildMatrix, BuildMatrixPlanner, MatrixRequest};
use distcc_cross::pipeline::{LaneError, Pipeline, PipelineConfig};
use distcc_cross::summary::ExitCode;
use distcc_cross::telemetry;
use serde_json::{Map, Value};

const DEFAULT_DISTRO: &str = "debian:buster";

#[derive(Parser)]
#[command(name = "distcc-cross")]
#[command(about = "Build and verify distcc cross-compiler images", version)]
struct Cli {
    /// Project config file (default: ./distcc-cross.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Directory holding the rendered per-distro trees
    #[arg(long, global = true, env = "DISTCC_CROSS_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Image tag (e.g., devel, latest)
    #[arg(long)]
    tag: Option<String>,

    /// Print the planned jobs without running them
    #[arg(long)]
    dry_run: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Write matrix.json and run_summary.json under <DIR>/<run_id>/
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one host image, its client images, and test every pairing
    Matrix {
        /// Host architecture id
        host_arch: String,

        /// Client architecture ids (default: every client arch of the distro)
        client_archs: Vec<String>,

        #[arg(long, default_value = DEFAULT_DISTRO)]
        distro: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Build a single host image
    BuildHost {
        distro: String,
        arch: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Build a single client image
    BuildClient {
        distro: String,
        arch: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Build every host and client image of every distro
    BuildAll {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Run one host/client verification
    Test {
        distro: String,
        host_arch: String,
        client_arch: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List registered distros
    ListDistros,

    /// List host architectures of a distro
    ListHostArchs { distro: String },

    /// List client architectures of a distro with their distccd port and toolchain
    ListClientArchs { distro: String },

    /// Print the effective configuration as JSON
    Config,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(ExitCode::InvalidInput.as_i32());
        }
        Err(e) => e.exit(),
    };

    telemetry::init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code().as_i32());
        }
    }
}

fn run(cli: Cli) -> Result<i32, LaneError> {
    match &cli.command {
        Commands::ListDistros => {
            for distro in Distro::all() {
                println!("{}", distro.name);
            }
            Ok(0)
        }
        Commands::ListHostArchs { distro } => list_archs(distro, Role::Host),
        Commands::ListClientArchs { distro } => list_archs(distro, Role::Client),
        Commands::Config => {
            let runner = SystemProcessRunner;
            let pipeline = Pipeline::load(pipeline_config(&cli, None), &runner)?;
            println!("{}", pipeline.effective_config().to_json()?);
            Ok(0)
        }
        Commands::Matrix {
            host_arch,
            client_archs,
            distro,
            run,
        } => execute(&cli, run, |planner, tag| {
            let client_archs = if client_archs.is_empty() {
                Distro::get(distro)
                    .map_err(distcc_cross::matrix::PlanError::from)?
                    .archs(Role::Client)
                    .iter()
                    .map(|a| a.to_string())
                    .collect()
            } else {
                client_archs.clone()
            };
            planner.plan(&MatrixRequest {
                distro: distro.clone(),
                host_arch: host_arch.clone(),
                client_archs,
                tag: tag.to_string(),
            })
        }),
        Commands::BuildHost { distro, arch, run } => execute(&cli, run, |planner, tag| {
            planner.plan_build(distro, Role::Host, arch, tag)
        }),
        Commands::BuildClient { distro, arch, run } => execute(&cli, run, |planner, tag| {
            planner.plan_build(distro, Role::Client, arch, tag)
        }),
        Commands::BuildAll { run } => {
            execute(&cli, run, |planner, tag| Ok(planner.plan_all(tag)))
        }
        Commands::Test {
            distro,
            host_arch,
            client_arch,
            run,
        } => execute(&cli, run, |planner, _| {
            planner.plan_test(distro, host_arch, client_arch)
        }),
    }
}

fn list_archs(distro: &str, role: Role) -> Result<i32, LaneError> {
    let distro = Distro::get(distro).map_err(distcc_cross::matrix::PlanError::from)?;
    for arch in distro.archs(role) {
        match role {
            Role::Host => println!("{}", arch),
            Role::Client => println!("{}", distro.client_summary(arch)),
        }
    }
    Ok(0)
}

/// CLI flags become the highest-priority config layer
fn cli_overrides(cli: &Cli, run: Option<&RunArgs>) -> Option<Value> {
    let mut overrides = Map::new();
    if let Some(dir) = &cli.project_dir {
        overrides.insert(
            "project_dir".to_string(),
            Value::String(dir.to_string_lossy().to_string()),
        );
    }
    if let Some(tag) = run.and_then(|r| r.tag.as_ref()) {
        overrides.insert("tag".to_string(), Value::String(tag.clone()));
    }
    if overrides.is_empty() {
        None
    } else {
        Some(Value::Object(overrides))
    }
}

fn pipeline_config(cli: &Cli, run: Option<&RunArgs>) -> PipelineConfig {
    PipelineConfig {
        host_config_path: default_host_config_path(),
        project_config_path: Some(
            cli.config
                .clone()
                .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE)),
        ),
        cli_overrides: cli_overrides(cli, run),
        artifacts_dir: run.and_then(|r| r.artifacts_dir.clone()),
    }
}

fn execute<F>(cli: &Cli, args: &RunArgs, plan: F) -> Result<i32, LaneError>
where
    F: FnOnce(&BuildMatrixPlanner, &str) -> Result<BuildMatrix, distcc_cross::matrix::PlanError>,
{
    let runner = SystemProcessRunner;
    let pipeline = Pipeline::load(pipeline_config(cli, Some(args)), &runner)?;
    let matrix = plan(&pipeline.planner(), &pipeline.lane().tag)?;

    if args.dry_run {
        if args.json {
            println!("{}", matrix.to_json()?);
        } else {
            print!("{}", matrix);
        }
        return Ok(ExitCode::Success.as_i32());
    }

    let run = pipeline.execute(&matrix)?;
    if args.json {
        println!("{}", run.summary.to_json()?);
    } else {
        println!("{}", run.summary.human_summary);
        if let Some(dir) = &run.artifact_dir {
            println!("Artifacts: {}", dir.display());
        }
    }
    Ok(run.summary.exit_code)
}
