mod aggregate;
mod config;
mod error;
mod gateway;
mod model;
mod orchestrator;
mod poller;
mod session;
mod transport;

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use config::{CliArgs, ClientConfig, Command};
use gateway::SubmissionGateway;
use model::OverallStatus;
use orchestrator::Orchestrator;
use poller::PollPhase;
use session::Session;
use transport::Transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradewire=info".into()),
        )
        .init();

    let args = CliArgs::parse();
    let config = ClientConfig::from_args(&args);
    info!("gradewire v{}", env!("CARGO_PKG_VERSION"));
    info!("Server: {}", config.server);

    let session = Arc::new(Session::new(config.token.clone()));
    let transport = Arc::new(Transport::new(config.server.clone(), session.clone())?);
    let gateway = Arc::new(SubmissionGateway::new(transport));

    // Surface transport notices and forced logouts on the terminal.
    let mut notices = session.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            warn!("{}: {}", notice.title, notice.message);
        }
    });
    let mut logged_out = session.logged_out();
    tokio::spawn(async move {
        if logged_out.changed().await.is_ok() && *logged_out.borrow() {
            warn!("Session expired, further requests will be unauthenticated");
        }
    });

    match args.command {
        Command::Run {
            problem,
            file,
            language,
        } => {
            let source = std::fs::read_to_string(&file)?;
            anyhow::ensure!(!language.trim().is_empty(), "language must not be empty");
            let orchestrator = Orchestrator::new(gateway, problem);
            let rx = orchestrator.run(&source, &language, print_diagnostic);
            watch_until_done(rx).await
        }
        Command::Submit {
            problem,
            file,
            language,
        } => {
            let source = std::fs::read_to_string(&file)?;
            anyhow::ensure!(!language.trim().is_empty(), "language must not be empty");
            let orchestrator = Orchestrator::new(gateway, problem).with_completion_hook(Arc::new(
                || info!("Submission recorded, history is up to date"),
            ));
            let rx = orchestrator.submit(&source, &language, print_diagnostic);
            watch_until_done(rx).await
        }
        Command::History {
            problem,
            page,
            page_size,
        } => {
            let submissions = gateway.list_submissions(&problem, page, page_size).await?;
            if submissions.is_empty() {
                println!("No submissions for problem {problem}");
            }
            for submission in submissions {
                println!(
                    "{}  {:?}  score={}",
                    submission.id,
                    submission.status,
                    submission
                        .score
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(())
        }
    }
}

fn print_diagnostic(outcome: model::TestOutcome) {
    let test = outcome
        .test_case_id
        .map(|id| format!("test case {id}"))
        .unwrap_or_else(|| "pre-test stage".to_string());
    eprintln!(
        "--- {} ({}) ---\n{}",
        test,
        outcome.status,
        outcome.error_message.unwrap_or_default()
    );
}

async fn watch_until_done(
    mut rx: tokio::sync::watch::Receiver<orchestrator::RunState>,
) -> anyhow::Result<()> {
    loop {
        let state = rx.borrow_and_update().clone();
        match &state.phase {
            PollPhase::Idle => {}
            PollPhase::AwaitingCreation => println!("Creating submission..."),
            PollPhase::Queued => println!(
                "Queued as {}",
                state.submission_id.as_deref().unwrap_or("?")
            ),
            PollPhase::Polling => println!("Waiting for results (attempt {})...", state.attempt),
            PollPhase::Completed => {
                let result = state
                    .result
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("terminal state without result"))?;
                println!(
                    "Done: {:?} — score {} ({}/{} tests passed)",
                    result.status, result.score, result.passed, result.total
                );
                return match result.status {
                    OverallStatus::Accepted => Ok(()),
                    _ => std::process::exit(1),
                };
            }
            PollPhase::Failed | PollPhase::TimedOut => {
                eprintln!(
                    "{}",
                    state.message.as_deref().unwrap_or("Run did not complete")
                );
                std::process::exit(1);
            }
        }
        if rx.changed().await.is_err() {
            anyhow::bail!("state channel closed before a terminal result");
        }
    }
}
