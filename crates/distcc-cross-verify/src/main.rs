//! distcc-cross-verify entrypoint
//!
//! Usage: distcc-cross-verify <EXPECTED_ARCH> [--archive PATH | --skip-compile]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use distcc_cross_arch::{ArchCatalog, CatalogVariant};
use distcc_cross_verify::{telemetry, SystemEnvironment, VerificationRunner, VerifyOptions};

#[derive(Parser)]
#[command(name = "distcc-cross-verify")]
#[command(about = "Verify ccache/distcc wiring inside a cross-compiler client container", version)]
struct Cli {
    /// Architecture id the container is expected to run as (e.g., arm64v8)
    expected_arch: String,

    /// Machine identifier table to check against
    #[arg(long, default_value = "debian")]
    variant: CatalogVariant,

    /// Reference C project archive (.tar or .tar.zst) with a `test` make target
    #[arg(long, env = "DISTCC_CROSS_TEST_ARCHIVE")]
    archive: Option<PathBuf>,

    /// Scratch directory, wiped before use
    #[arg(long, default_value = distcc_cross_verify::runner::DEFAULT_SCRATCH_DIR)]
    scratch_dir: PathBuf,

    /// Skip the double-compile smoke test; without it an archive is required
    #[arg(long)]
    skip_compile: bool,

    /// Print the per-check result as JSON
    #[arg(long)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    telemetry::init_tracing(cli.verbose);

    let options = VerifyOptions {
        archive: cli.archive,
        skip_compile: cli.skip_compile,
        scratch_dir: cli.scratch_dir,
        ..VerifyOptions::default()
    };
    let runner = VerificationRunner::new(SystemEnvironment, ArchCatalog::new(cli.variant), options);

    let (result, failure) = match runner.verify(&cli.expected_arch) {
        Ok(result) => (result, None),
        Err(failure) => (failure.result.clone(), Some(failure)),
    };

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    match failure {
        Some(failure) => {
            eprintln!("Verification failed: {}", failure);
            ExitCode::FAILURE
        }
        None => {
            if !cli.json {
                println!("Verification passed for {}", cli.expected_arch);
            }
            ExitCode::SUCCESS
        }
    }
}
