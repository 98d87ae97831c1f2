use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use hector::bitbucket::Environment;
use hector::cli::{self, ReportFiles};
use hector::clock::ZonedClock;
use hector::diff::{self as diffcover, DiffCover, ExistingReport, ReportGenerator};

/// hector — diff coverage reports as Bitbucket pull request comments.
#[derive(Parser)]
#[command(name = "hector", version, about)]
struct Cli {
    /// coverage.py JSON report.
    #[arg(long, global = true, default_value = "coverage.json")]
    coverage: PathBuf,

    /// diff-cover JSON report.
    #[arg(long, global = true, default_value = "diff-coverage.json")]
    diff_coverage: PathBuf,

    /// Cobertura XML report fed to diff-cover.
    #[arg(long, global = true, default_value = "coverage.xml")]
    coverage_xml: PathBuf,

    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the diff coverage report and post a comment to the pull request.
    Report {
        /// Branch to compare against.
        #[arg(long, default_value = diffcover::DEFAULT_COMPARE_BRANCH)]
        compare_branch: String,

        /// Diff coverage percent below which a failing exit code is returned.
        #[arg(long, allow_negative_numbers = true)]
        fail_under: Option<i64>,

        /// Only prepare the comment without posting it.
        #[arg(long)]
        dry: bool,
    },

    /// Post a comment from existing reports.
    Post {
        /// Exit code of the coverage gate (default: $BITBUCKET_EXIT_CODE, else 0).
        #[arg(long, allow_negative_numbers = true)]
        exit_code: Option<i32>,

        /// Only prepare the comment without posting it.
        #[arg(long)]
        dry: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let env = Environment::from_env();
    let files = ReportFiles {
        coverage: cli.coverage,
        diff_coverage: cli.diff_coverage.clone(),
    };

    let (generator, dry): (Box<dyn ReportGenerator>, bool) = match cli.command {
        Commands::Report {
            compare_branch,
            fail_under,
            dry,
        } => {
            let diff_cover = DiffCover::new(
                cli.coverage_xml,
                cli.diff_coverage,
                &compare_branch,
                fail_under,
            )?;
            (Box::new(diff_cover) as Box<dyn ReportGenerator>, dry)
        }
        Commands::Post { exit_code, dry } => {
            let exit_code = match exit_code {
                Some(code) => code,
                None => env.exit_code()?,
            };
            (Box::new(ExistingReport { exit_code }) as Box<dyn ReportGenerator>, dry)
        }
    };

    let rendered = cli::cmd_render(generator.as_ref(), &files, &env, &ZonedClock::ist())?;

    if !rendered.gate.stdout.is_empty() {
        println!("{}", rendered.gate.stdout);
    }
    if !rendered.gate.stderr.is_empty() {
        eprintln!("{}", rendered.gate.stderr);
    }

    if dry {
        println!("{}", rendered.comment);
    } else {
        let client = env
            .client()
            .context("Bitbucket pipeline environment is incomplete")?;
        print!("{}", cli::cmd_deliver(&rendered.comment, &client)?);
    }

    if !rendered.gate.success() {
        std::process::exit(rendered.gate.exit_code);
    }
    Ok(())
}
