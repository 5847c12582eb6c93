//! CLI front-end: read file paths from stdin, run the relevance search,
//! print the condensed context to stdout and all non-fatal errors to stderr.

use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use llmap::{
    Client, Config, PhaseProgress, Pipeline, Progress, SearchOptions, TreeSitterParser,
};

#[derive(Parser, Debug)]
#[command(
    name = "llmap",
    version,
    about = "Analyze source files for relevance to a question"
)]
struct Args {
    /// Question to check relevance against
    question: String,

    /// Number of random files to sample from the input set
    #[arg(long)]
    sample: Option<usize>,

    /// Maximum number of concurrent LLM requests
    #[arg(long, default_value_t = 100)]
    llm_concurrency: usize,

    /// Skip refinement and combination of analyses
    #[arg(long)]
    no_refine: bool,

    /// Skip the skeleton triage phase for all files
    #[arg(long)]
    no_skeletons: bool,
}

/// Terminal progress bars, one per phase, with a received-lines counter fed
/// by the streaming callbacks.
struct TerminalProgress {
    multi: MultiProgress,
}

impl TerminalProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }
}

impl Progress for TerminalProgress {
    fn start_phase(&self, desc: &str, total: usize) -> Arc<dyn PhaseProgress> {
        let bar = self.multi.add(ProgressBar::new(total as u64));
        let style = ProgressStyle::with_template("{prefix}: {percent:>3}%|{bar:40}| {pos}/{len}{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_prefix(desc.to_string());
        Arc::new(TerminalPhase {
            bar,
            lines: AtomicUsize::new(0),
        })
    }
}

struct TerminalPhase {
    bar: ProgressBar,
    lines: AtomicUsize,
}

impl PhaseProgress for TerminalPhase {
    fn lines_received(&self, n: usize) {
        let total = self.lines.fetch_add(n, Ordering::Relaxed) + n;
        self.bar.set_message(format!(", Rcvd {total}"));
    }

    fn item_done(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

fn read_source_files(input: impl BufRead) -> std::io::Result<Vec<String>> {
    let mut source_files = Vec::new();
    for line in input.lines() {
        let path = line?.trim().to_string();
        if path.is_empty() {
            continue;
        }
        if !Path::new(&path).is_file() {
            eprintln!("Warning: File does not exist: {path}");
            continue;
        }
        source_files.push(path);
    }
    Ok(source_files)
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut source_files = read_source_files(std::io::stdin().lock())?;
    if source_files.is_empty() {
        eprintln!("Error: No valid source files provided");
        return Ok(ExitCode::FAILURE);
    }

    if let Some(sample) = args.sample {
        if sample < source_files.len() {
            fastrand::shuffle(&mut source_files);
            source_files.truncate(sample);
        }
    }

    let client = Arc::new(Client::new(Config::from_env()?)?);
    let parser = Arc::new(TreeSitterParser::new(client.token_counter()));
    let options = SearchOptions {
        concurrency: args.llm_concurrency,
        refine: !args.no_refine,
        analyze_skeletons: !args.no_skeletons,
    };
    let pipeline = Pipeline::new(client, parser).with_options(options);

    let progress = TerminalProgress::new();
    let out = pipeline
        .search(&args.question, &source_files, &progress)
        .await?;

    if !out.errors.is_empty() {
        eprintln!("Errors encountered:");
        for error in &out.errors {
            eprintln!("{error}");
        }
        eprintln!();
    }
    println!("{}", out.context);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("llmap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
