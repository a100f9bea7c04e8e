use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use thumb_archiver::handler::{BatchHandler, MessageReport};
use thumb_archiver::infra::build_pipeline;
use thumb_archiver::metrics::init_metrics;
use thumb_archiver::{logging, Config};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "thumber")]
#[command(about = "Fetches listing thumbnails once and archives them")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (defaults to $THUMBER_CONFIG or thumber.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a single URL
    Process { url: String },
    /// Handle a unit of work: one URL or a JSON array of URLs.
    /// Without INPUT, every non-empty stdin line is handled as a separate message.
    Handle { input: Option<String> },
    /// Show the archive record for a URL
    Status { url: String },
}

async fn read_messages(input: Option<String>) -> anyhow::Result<Vec<String>> {
    if let Some(input) = input {
        return Ok(vec![input]);
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut messages = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            messages.push(line.to_string());
        }
    }
    Ok(messages)
}

fn print_message_report(report: &MessageReport) {
    match &report.result {
        Ok(batch) => {
            println!(
                "message #{}: {} url(s), {} archived, {} skipped, {} failed",
                report.index,
                batch.len(),
                batch.archived(),
                batch.skipped(),
                batch.failures().count()
            );
            for failure in batch.failures() {
                if let Err(e) = &failure.result {
                    println!("   - [{}] {}", e.stage(), e);
                }
            }
        }
        Err(e) => println!("message #{}: rejected: {}", report.index, e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let _log_guard = logging::init_logging(&config.logging.dir);
    if let Some(addr) = config.metrics.listen_addr {
        init_metrics(addr);
    }

    let pipeline = Arc::new(build_pipeline(&config)?);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling in-flight work");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Process { url } => match pipeline.process(&cancel, &url).await {
            Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
            Err(e) => {
                error!("Processing {} failed: {}", url, e);
                return Err(e.into());
            }
        },
        Commands::Handle { input } => {
            let messages = read_messages(input).await?;
            info!("Handling {} message(s)", messages.len());

            let handler = BatchHandler::new(pipeline, config.pipeline.concurrency);
            let reports = handler.handle_messages(&cancel, &messages).await;
            for report in &reports {
                print_message_report(report);
            }

            let failed = reports.iter().filter(|r| !r.is_success()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} message(s) had failures", failed, reports.len());
            }
        }
        Commands::Status { url } => match pipeline.lookup(&url).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("{} is not archived", url),
        },
    }

    Ok(())
}
