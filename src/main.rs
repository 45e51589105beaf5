mod capture;
mod error;
mod normalize;
mod pipeline;
mod probe;
mod record;
mod report;
mod resolver;
mod settings;
mod timemap;
mod utils;

#[cfg(test)]
mod fakes;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::capture::CommandCapturer;
use crate::pipeline::Pipeline;
use crate::report::ReportFormat;
use crate::settings::{Aggregator, Settings};
use crate::utils::{format_duration, truncate};

#[derive(Parser)]
#[command(name = "memento-qa", about = "Memento timegate quality check across web archives")]
struct Cli {
    /// Memento aggregator serving the JSON timemap
    #[arg(long, global = true, value_enum)]
    aggregator: Option<Aggregator>,
    /// Simultaneous probes / captures
    #[arg(long, global = true, env = "MEMENTO_QA_CONCURRENCY")]
    concurrency: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every archive's snapshot nearest a date and print the report
    Run {
        /// Subject URL (default: configured default_url)
        #[arg(short, long)]
        url: Option<String>,
        /// Target timestamp, YYYYMMDDhhmmss (default: configured default_date)
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: ReportFormat,
        /// Skip screenshots even if a browser is installed
        #[arg(long)]
        no_capture: bool,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch and list the archive records of a timemap
    Timemap {
        #[arg(short, long)]
        url: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Report whether screenshots can be taken
    CaptureCheck,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(aggregator) = cli.aggregator {
        settings.timemap_base = aggregator.base_url().to_string();
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }

    let result = match cli.command {
        Commands::Run {
            url,
            date,
            format,
            no_capture,
            output,
        } => {
            if no_capture {
                settings.capture_enabled = false;
            }
            let pipeline = Pipeline::from_settings(settings)?;
            let outcome = pipeline
                .run_timegate(url.as_deref(), date.as_deref())
                .await
                .context("Timegate request failed")?;

            eprintln!(
                "Probed {} archives: {} resolved, {} failed, {} abandoned",
                outcome.resolve.probed,
                outcome.resolve.resolved,
                outcome.resolve.failed,
                outcome.resolve.abandoned
            );
            if pipeline.capture_available() {
                eprintln!(
                    "Captured {}/{} snapshots ({} failed, {} abandoned)",
                    outcome.capture.captured,
                    outcome.capture.attempted,
                    outcome.capture.failed,
                    outcome.capture.abandoned
                );
            }

            let rendered = outcome.report.render(format);
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => println!("{}", rendered),
            }
            Ok(())
        }
        Commands::Timemap { url, limit } => {
            settings.capture_enabled = false;
            let pipeline = Pipeline::from_settings(settings)?;
            let subject = pipeline.subject(url.as_deref())?;
            let records = timemap::fetch_timemap(
                pipeline.prober(),
                &pipeline.settings().timemap_base,
                &subject,
            )
            .await?;
            if records.is_empty() {
                println!("No archive records in timemap.");
                return Ok(());
            }

            println!("{:>3} | {:<20} | {:<13} | {}", "#", "Archive", "Compliance", "URI");
            println!("{}", "-".repeat(100));
            for (i, r) in records.iter().take(limit).enumerate() {
                println!(
                    "{:>3} | {:<20} | {:<13} | {}",
                    i + 1,
                    truncate(&r.archive_id, 20),
                    format!("{:?}", r.compliance),
                    r.current_url
                );
            }
            let compliant = records.iter().filter(|r| r.is_compliant()).count();
            println!("\n{} archives | {} memento compliant", records.len(), compliant);
            Ok(())
        }
        Commands::CaptureCheck => {
            match CommandCapturer::detect(&settings) {
                Ok(_) => println!("Capture available via {}", settings.capture_bin),
                Err(e) => println!("Capture unavailable: {}", e),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}
