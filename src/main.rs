use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use invoice_auditor::app::ports::ReportStorePort;
use invoice_auditor::config::Config;
use invoice_auditor::infra::report_store::FsReportStore;
use invoice_auditor::logging;
use invoice_auditor::observability::metrics;
use invoice_auditor::{InvoiceData, PipelineOrchestrator, PipelineState, PipelineStatus, RerunRequest};

#[derive(Parser)]
#[command(name = "invoice_auditor")]
#[command(about = "Audits incoming invoices against purchase orders")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Record metrics and print them in Prometheus format on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one document from the inbox
    Run {
        /// Specific file in the inbox instead of the next one waiting
        #[arg(long)]
        file: Option<String>,
    },
    /// Keep polling the inbox and process documents as they arrive
    Watch {
        /// Seconds to sleep when the inbox is empty
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        /// Stop after this many pipeline runs
        #[arg(long)]
        max_runs: Option<usize>,
    },
    /// Re-run a reported invoice with operator-corrected fields
    Rerun {
        /// Identifier of the report being corrected
        #[arg(long)]
        invoice_id: String,
        /// JSON file with the corrected invoice fields
        #[arg(long)]
        corrected: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.metrics {
        if let Err(e) = metrics::init() {
            warn!("Metrics disabled: {}", e);
        }
    }

    let orchestrator = PipelineOrchestrator::from_config(&config);
    let store = FsReportStore::new(&config.reports.output_dir);

    match cli.command {
        Commands::Run { file } => {
            println!("🔄 Running audit pipeline...");
            let state = orchestrator.run(PipelineState::new(file));
            finish_run(&state, &store);
        }
        Commands::Watch {
            interval_secs,
            max_runs,
        } => {
            info!("👀 Watching {} every {}s", config.intake.incoming_dir.display(), interval_secs);
            let mut runs = 0usize;
            loop {
                if max_runs.is_some_and(|max| runs >= max) {
                    info!("Reached {} runs, stopping", runs);
                    break;
                }
                let state = orchestrator.run(PipelineState::new(None));
                runs += 1;
                if state.status == PipelineStatus::Waiting {
                    tokio::time::sleep(Duration::from_secs(interval_secs)).await;
                } else {
                    finish_run(&state, &store);
                }
            }
        }
        Commands::Rerun {
            invoice_id,
            corrected,
        } => {
            let content = std::fs::read_to_string(&corrected)
                .with_context(|| format!("reading {}", corrected.display()))?;
            let corrected_fields: InvoiceData = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", corrected.display()))?;

            println!("🔁 Re-running {} with corrected data...", invoice_id);
            let state = orchestrator.rerun(RerunRequest {
                invoice_id,
                corrected_fields,
            });
            finish_run(&state, &store);
        }
    }

    if cli.metrics {
        if let Some(text) = metrics::render() {
            println!("\n{}", text);
        }
    }
    Ok(())
}

/// Persist the report of a completed run and print the outcome.
fn finish_run(state: &PipelineState, store: &dyn ReportStorePort) {
    println!("\n📊 Pipeline result for {}:", state.file_name.as_deref().unwrap_or("(none)"));
    println!("   Status: {}", state.status);

    match state.status {
        PipelineStatus::Completed => {
            if let (Some(record), Some(html)) = (&state.report_record, &state.final_report) {
                println!("   Summary: {}", record.summary);
                match store.save(record, html) {
                    Ok(path) => println!("   Report: {}", path.display()),
                    Err(e) => {
                        error!("Failed to save report {}: {}", record.id, e);
                        println!("❌ Could not save report: {}", e);
                    }
                }
            }
            if !state.discrepancies.is_empty() {
                println!("\n⚠️  Discrepancies:");
                for d in &state.discrepancies {
                    println!("   - {}", d);
                }
            }
        }
        PipelineStatus::Waiting => println!("   📭 No documents waiting"),
        PipelineStatus::Failed => {
            let kind = state.error_kind.map(|k| k.to_string()).unwrap_or_default();
            println!(
                "❌ {} ({})",
                state.error_message.as_deref().unwrap_or("unknown error"),
                kind
            );
        }
        _ => {}
    }
}
