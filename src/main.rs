use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use stress_tester::runner::{
    DEFAULT_COMPILER, DEFAULT_MAX_TRIALS, DEFAULT_TIMEOUT, ProgramSources, SessionArgs,
    SessionConfigBuilder, SessionEvent, SessionReport, SessionVerdict, Toolchain, load_samples,
    run_samples, run_stress, spawn_progress_display,
};
use tokio::sync::mpsc;

#[derive(Parser, Clone)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Check the candidate against the sample tests of a problem
    Samples {
        #[command(flatten)]
        common: CommonArgs,

        /// Sample file (Competitive Companion JSON or a list of {input, output})
        #[arg(short, long)]
        samples: PathBuf,
    },
    /// Compare the candidate with the oracle on generated inputs
    Stress {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of generated trials
        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_TRIALS)]
        trials: usize,
    },
}

#[derive(Clone, ClapArgs)]
struct CommonArgs {
    /// Working directory containing solution.cpp, brute.cpp and gen.cpp
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Candidate source (default: <dir>/solution.cpp)
    #[arg(long)]
    candidate: Option<PathBuf>,

    /// Oracle source (default: <dir>/brute.cpp)
    #[arg(long)]
    oracle: Option<PathBuf>,

    /// Generator source (default: <dir>/gen.cpp)
    #[arg(long)]
    generator: Option<PathBuf>,

    /// Time limit per execution in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Number of workers (default: available parallelism, clamped to 4..=16)
    #[arg(short, long)]
    workers: Option<usize>,

    /// C++ compiler driver
    #[arg(long, default_value = DEFAULT_COMPILER)]
    compiler: PathBuf,

    /// Extra compiler flag, repeatable (e.g. --flag=-DLOCAL)
    #[arg(long = "flag", allow_hyphen_values = true)]
    flags: Vec<String>,

    /// Directory for trial logs (default: logs/ next to the candidate)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Quiet mode - minimal output, only show summary
    #[arg(short, long)]
    quiet: bool,
}

impl CommonArgs {
    fn session_args(&self, max_trials: Option<usize>) -> anyhow::Result<SessionArgs> {
        let defaults = ProgramSources::in_dir(&self.dir);
        let sources = ProgramSources {
            candidate: self.candidate.clone().unwrap_or(defaults.candidate),
            oracle: self.oracle.clone().unwrap_or(defaults.oracle),
            generator: self.generator.clone().unwrap_or(defaults.generator),
        };

        let mut builder = SessionConfigBuilder::default();
        builder
            .timeout(Duration::from_millis(self.timeout_ms))
            .toolchain(Toolchain::new(&self.compiler).with_flags(self.flags.iter().cloned()));
        if let Some(log_dir) = &self.log_dir {
            builder.log_dir(log_dir.clone());
        }
        if let Some(trials) = max_trials {
            builder.max_trials(trials);
        }
        if let Some(workers) = self.workers {
            builder.worker_count(workers);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        Ok(SessionArgs { sources, config })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (common, report) = match args.command {
        Command::Samples { common, samples } => {
            init_tracing(common.quiet);
            let session_args = common.session_args(None)?;
            let samples = load_samples(&samples).await?;
            print_header("Samples", &session_args, common.quiet);

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let display = spawn_progress_display(events_rx, common.quiet);
            let report = run_samples(session_args, samples, events_tx).await;
            print_terminal(display.await?);
            (common, report)
        }
        Command::Stress { common, trials } => {
            init_tracing(common.quiet);
            let session_args = common.session_args(Some(trials))?;
            print_header("Stress", &session_args, common.quiet);

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let display = spawn_progress_display(events_rx, common.quiet);
            let report = run_stress(session_args, events_tx).await;
            print_terminal(display.await?);
            (common, report)
        }
    };

    print_summary(&report, common.quiet);
    match report.verdict {
        SessionVerdict::Done => Ok(()),
        SessionVerdict::Failed { index } => Err(anyhow::anyhow!("Trial {} failed", index)),
        SessionVerdict::Error { message } => Err(anyhow::anyhow!(message)),
    }
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("stress_tester=warn")
    } else {
        EnvFilter::new("stress_tester=info")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_header(mode: &str, args: &SessionArgs, quiet: bool) {
    if quiet {
        return;
    }
    println!("Stress Tester ({})", mode);
    println!("=============");
    println!("Candidate: {}", args.sources.candidate.display());
    if mode == "Stress" {
        println!("Oracle: {}", args.sources.oracle.display());
        println!("Generator: {}", args.sources.generator.display());
        println!("Trials: {}", args.config.max_trials);
    }
    println!("Timeout: {}ms", args.config.timeout.as_millis());
    println!();
}

/// Show the failing trial in full; the summary only carries its index
fn print_terminal(terminal: Option<SessionEvent>) {
    if let Some(SessionEvent::Fail {
        index,
        input,
        expected,
        actual,
        diagnostic,
    }) = terminal
    {
        println!();
        println!("Trial {} failed", index);
        if let Some(diagnostic) = diagnostic {
            println!("Reason: {}", diagnostic);
        }
        println!("--- input ---\n{}", input);
        println!("--- expected ---\n{}", expected);
        println!("--- actual ---\n{}", actual);
    }
}

fn print_summary(report: &SessionReport, quiet: bool) {
    println!();
    println!("Session Summary");
    println!("===============");
    if !quiet {
        println!("Session ID: {}", report.session_id);
        println!("Mode: {}", report.mode);
    }
    println!(
        "Trials passed: {}/{}",
        report.trials_passed, report.trials_attempted
    );
    println!("Duration: {:.2}s", report.duration.as_secs_f64());
    match &report.verdict {
        SessionVerdict::Done => println!("Result: all trials passed"),
        SessionVerdict::Failed { index } => println!("Result: trial {} failed", index),
        SessionVerdict::Error { message } => println!("Result: error: {}", message),
    }
    if let Some(log_dir) = &report.log_dir {
        println!("Logs: {}", log_dir.display());
    }
}
