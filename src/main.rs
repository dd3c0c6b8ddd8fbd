mod cli;
mod config;
mod logging;
mod model;
mod providers;
mod sync;

use anyhow::{Context, Result};

use sync::journal::Journal;
use sync::{IssueOutcome, Orchestrator, WorkerOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = cli::parse_args(&args)?;
    if args.help {
        cli::print_help();
        return Ok(());
    }

    let _log_guard = logging::init(args.verbose, args.log_file.as_deref())?;

    // Configuration problems are the only fatal errors; nothing has run yet.
    let config = config::load_sync_config(args.config.as_deref())
        .context("Invalid configuration")?;

    let journal = if config.journal {
        Journal::File(Journal::default_path())
    } else {
        Journal::Disabled
    };

    let (source, tracker) = providers::create_providers(&config);
    let orchestrator = Orchestrator::new(config, source, tracker, journal)?;

    for report in orchestrator.run().await {
        let state = match &report.outcome {
            WorkerOutcome::Done => "done".to_string(),
            WorkerOutcome::DoneWithSkips => "done, some issues skipped".to_string(),
            WorkerOutcome::Failed(e) => format!("failed: {e}"),
        };
        println!(
            "{}: {} created, {} already present, {} failed ({state})",
            report.label,
            report.created(),
            report.already_present(),
            report.failed()
        );
        for issue in &report.issues {
            if let IssueOutcome::Failed(reason) = &issue.outcome {
                println!("  {} skipped: {reason}", issue.issue_id);
            }
        }
    }

    Ok(())
}
