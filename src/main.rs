use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use wallfetch::config::{Config, setup_logging};
use wallfetch::orchestrator::{Orchestrator, RunOutcome};
use wallfetch::transport::HttpTransport;

fn main() -> Result<()> {
    let cli = wallfetch::cli::CliOptions::parse();

    setup_logging(cli.debug)?;

    let config = Config::from(&cli);
    info!(
        "Writing {:?} to {} (budget {} KB)",
        config.format,
        config.output_path.display(),
        config.size_budget_kb
    );
    let transport = HttpTransport::new(config.request_timeout, config.retry_policy.clone());
    let orchestrator = Orchestrator::new(config, transport);

    // a run that produced nothing still exits cleanly; the log says why
    match orchestrator.run() {
        RunOutcome::Produced { url, attempts, .. } => {
            info!("Done: {} ({} attempt(s))", url, attempts);
        }
        RunOutcome::Exhausted { attempts, failures } => {
            error!("Gave up after {} attempt(s)", attempts);
            for failure in failures {
                error!("  {} [{}]: {}", failure.url, failure.stage, failure.error);
            }
        }
        RunOutcome::NoCandidates => {
            error!("No candidates to choose from");
        }
    }
    Ok(())
}
