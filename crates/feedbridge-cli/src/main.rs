//! feedbridge: turn input records into HTTP requests and normalize the responses.

mod input;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use feedbridge_core::{BridgeConfig, CanonicalDocument, PollingClock, SystemClock, TimeTokens};
use feedbridge_dispatch::ReqwestTransport;
use feedbridge_host::{Bridge, RequestTemplates};
use feedbridge_normalize::{DelimitedOptions, ResponseNormalizer};
use feedbridge_schema::SchemaResolver;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "feedbridge",
    about = "Render HTTP requests from records and normalize JSON, XML, or CSV responses",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "FEEDBRIDGE_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the request a record would trigger, without sending it.
    Render {
        /// Bridge configuration (JSON object of properties).
        #[arg(short, long, env = "FEEDBRIDGE_CONFIG")]
        config: PathBuf,

        /// Input record as a JSON object.
        #[arg(short, long)]
        record: String,
    },

    /// Normalize a saved response body with the configured format.
    Normalize {
        #[arg(short, long, env = "FEEDBRIDGE_CONFIG")]
        config: PathBuf,

        /// File holding the response body.
        #[arg(short, long)]
        body: PathBuf,

        /// JSON array of `{name, fields}` schemas to seed the registry with.
        #[arg(long)]
        schemas: Option<PathBuf>,
    },

    /// Process newline-delimited JSON records and print documents as JSON lines.
    Run {
        #[arg(short, long, env = "FEEDBRIDGE_CONFIG")]
        config: PathBuf,

        /// NDJSON record file; stdin when omitted.
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long)]
        schemas: Option<PathBuf>,

        /// Seconds to wait for in-flight requests after the input ends.
        #[arg(long, default_value_t = 30)]
        drain_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    info!("feedbridge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Render { config, record } => render(&config, &record),
        Command::Normalize {
            config,
            body,
            schemas,
        } => normalize(&config, &body, schemas.as_deref()),
        Command::Run {
            config,
            input,
            schemas,
            drain_secs,
        } => {
            run(
                &config,
                input.as_deref(),
                schemas.as_deref(),
                Duration::from_secs(drain_secs),
            )
            .await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    BridgeConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn render(config_path: &Path, record: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let record = input::parse_record(record)?;
    let templates = RequestTemplates::compile(&config);

    let clock = SystemClock;
    let polling = PollingClock::with_window(&clock, config.polling_window_secs, config.epoch_unit);
    let request = templates.build(&record, &TimeTokens::new(&polling, &clock));

    let unknown: Vec<&str> = templates
        .placeholders()
        .into_iter()
        .filter(|name| record.definition().index_of(name).is_none() && !name.starts_with('$'))
        .collect();
    if !unknown.is_empty() {
        warn!(?unknown, "placeholders not matched by the record are passed through");
    }

    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

fn normalize(config_path: &Path, body_path: &Path, schemas: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let body = std::fs::read_to_string(body_path)
        .with_context(|| format!("reading body {}", body_path.display()))?;
    let registry = Arc::new(input::load_registry(schemas)?);
    let normalizer = ResponseNormalizer::new(
        DelimitedOptions::from_config(&config),
        Arc::new(SchemaResolver::new(registry)),
    );

    let document = normalizer
        .normalize(&body, config.response_format)
        .with_context(|| format!("normalizing {} body", config.response_format))?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

async fn run(
    config_path: &Path,
    input_path: Option<&Path>,
    schemas: Option<&Path>,
    drain: Duration,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = Arc::new(input::load_registry(schemas)?);

    let (tx, rx) = mpsc::unbounded_channel::<CanonicalDocument>();
    let writer = tokio::spawn(write_documents(rx));
    let bridge = Bridge::start(
        &config,
        Arc::new(ReqwestTransport::new()),
        registry,
        Arc::new(tx),
    );

    let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = match input_path {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening input {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("reading input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match input::parse_record(&line) {
            Ok(record) => {
                if let Err(e) = bridge.process(&record) {
                    warn!(line = line_no, error = %e, "record not submitted");
                }
            }
            Err(e) => warn!(line = line_no, error = %e, "record skipped"),
        }
    }

    let report = bridge.shutdown(drain).await;
    // Drained workers have dropped their sender; a timed-out pool still holds one.
    drop(bridge);
    match report {
        Ok(report) => {
            writer.await.context("document writer")??;
            eprintln!(
                "{} submitted, {} emitted, {} failed, {} dropped in {:.1}s",
                report.stats.submitted,
                report.stats.emitted,
                report.stats.failed,
                report.stats.dropped,
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            writer.abort();
            Err(anyhow::Error::new(e).context("shutting down"))
        }
    }
}

async fn write_documents(mut rx: mpsc::UnboundedReceiver<CanonicalDocument>) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    while let Some(document) = rx.recv().await {
        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &document)?;
        writeln!(out)?;
        out.flush()?;
    }
    Ok(())
}
