//! `sellflow` - real-time product-sourcing task service and client
//!
//! This binary runs the sourcing service (task submission endpoint plus
//! the notification channel listener) or acts as a client: submit a
//! query, follow the live agent log, print the final report.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use console::Style;

use crate::cli::{Cli, Commands};
use sellflow_core::client::{ChannelEvent, ConnectionState, TaskPhase, TaskSession};
use sellflow_core::output::OutputFormatter;
use sellflow_core::store::ResultStore;
use sellflow_core::{Config, SourcingClient};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        let blue = Style::new().blue();
        println!(
            "{} v{} ({})",
            blue.apply_to("sellflow"),
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("sellflow=info,sellflow_core=info"),
        ))
        .init();

    let formatter = OutputFormatter::new();
    let mut config = Config::load().context("Failed to load configuration")?;

    match &cli.command {
        Some(Commands::Serve {
            http_addr,
            notify_addr,
        }) => {
            if let Some(addr) = http_addr {
                config.server.http_addr = addr.clone();
            }
            if let Some(addr) = notify_addr {
                config.server.notify_addr = addr.clone();
            }
            tokio::select! {
                result = sellflow_core::server::start_server(config) => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                }
            }
        }

        Some(Commands::Submit { query, no_follow }) => {
            handle_submit(query, *no_follow, &config, &formatter).await?;
        }

        None if !cli.query.is_empty() => {
            let query = cli.query.join(" ");
            handle_submit(&query, false, &config, &formatter).await?;
        }

        Some(Commands::Results) => {
            let store = ResultStore::new_in(config.data_dir()?);
            let records_file = store.load()?;
            formatter.print_records(&records_file.records);
        }

        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

/// Submit one task and, unless told otherwise, follow the agent stream
/// until the terminal result arrives.
async fn handle_submit(
    query: &str,
    no_follow: bool,
    config: &Config,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut session = TaskSession::new();
    let mut printed = 0usize;

    // Blank queries never reach the service.
    if !session.begin_submission(query) {
        return Ok(());
    }

    let client = SourcingClient::new(config)?;

    // Open the channel before submitting so no early frames are missed.
    let mut channel = if no_follow {
        None
    } else {
        match client.open_channel().await {
            Ok(channel) => Some(channel),
            Err(e) => {
                session.apply(ChannelEvent::TransportError(e.to_string()));
                None
            }
        }
    };

    match client.submit(query).await {
        Ok(started) => session.record_submitted(&started.task_id),
        Err(e) => {
            session.record_submission_failure(&e.to_string());
            print_new_logs(&mut printed, &session, formatter);
            return Ok(());
        }
    }
    print_new_logs(&mut printed, &session, formatter);

    let Some(channel) = channel.as_mut() else {
        return Ok(());
    };

    // Events apply in delivery order; a task that never completes would
    // stream forever, so Ctrl-C is the way out of a stuck follow.
    while let Some(event) = channel.next_event().await {
        session.apply(event);
        print_new_logs(&mut printed, &session, formatter);

        if session.phase() == TaskPhase::Completed {
            channel.close();
            break;
        }
        if session.connection() == ConnectionState::Closed {
            break;
        }
    }

    if let Some(result) = session.result() {
        formatter.print_result(result);
    }

    Ok(())
}

fn print_new_logs(printed: &mut usize, session: &TaskSession, formatter: &OutputFormatter) {
    for entry in &session.logs()[*printed..] {
        formatter.print_log(entry);
    }
    *printed = session.logs().len();
}
