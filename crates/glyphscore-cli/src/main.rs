//! glyphscore CLI — score drawings and run calibration sets.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "glyphscore",
    version,
    about = "Deterministic handwriting evaluation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output format for `evaluate`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum EvaluateFormat {
    Text,
    Json,
}

/// Output format for `compare`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CompareFormat {
    Text,
    Json,
    #[value(alias = "md")]
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one drawing against a reference image
    Evaluate {
        /// The learner's drawing (PNG, JPEG, ...)
        #[arg(long)]
        user: PathBuf,

        /// The reference rendering of the character
        #[arg(long)]
        reference: PathBuf,

        /// Character being practiced (personalizes feedback)
        #[arg(long)]
        character_id: Option<String>,

        /// Lesson the character belongs to
        #[arg(long)]
        lesson_id: Option<String>,

        /// Override the configured passing score (0-100)
        #[arg(long)]
        passing_score: Option<u32>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: EvaluateFormat,
    },

    /// Run a calibration set and save a JSON report
    Run {
        /// Path to .toml calibration set or directory
        #[arg(long)]
        calibration_set: PathBuf,

        /// Max concurrent evaluations
        #[arg(long, default_value = "4")]
        parallelism: usize,

        /// Output directory
        #[arg(long, default_value = "./glyphscore-results")]
        output: PathBuf,

        /// Filter by tags (comma-separated)
        #[arg(long)]
        filter: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two calibration reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Score drop (in points) that counts as a regression
        #[arg(long, default_value = "2.0")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: CompareFormat,
    },

    /// Validate calibration set TOML files
    Validate {
        /// Path to calibration set file or directory
        #[arg(long)]
        calibration_set: PathBuf,
    },

    /// Create starter config and example calibration set
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("glyphscore=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            user,
            reference,
            character_id,
            lesson_id,
            passing_score,
            config,
            format,
        } => commands::evaluate::execute(commands::evaluate::EvaluateArgs {
            user,
            reference,
            character_id,
            lesson_id,
            passing_score,
            config,
            format,
        }),
        Commands::Run {
            calibration_set,
            parallelism,
            output,
            filter,
            config,
        } => commands::run::execute(calibration_set, parallelism, output, filter, config).await,
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { calibration_set } => commands::validate::execute(calibration_set),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
