//! Hydrowatch CLI, control service and station agent entry point.
//!
//! Binary name: `hwatch`
//!
//! Parses CLI arguments, loads configuration, installs tracing, then either
//! runs the control service (`serve`), a station agent (`station`), or a
//! one-shot RPC against a running control service.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands, NeighborsCommand};
use hydrowatch_infra::config::{load_config, resolve_config_path};
use hydrowatch_infra::http::HttpControlClient;
use hydrowatch_observe::tracing_setup::{init_tracing, shutdown_tracing};
use hydrowatch_types::config::HydrowatchConfig;
use hydrowatch_types::station::StationId;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or tracing
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "hwatch", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.log_directive(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_config(config_path.as_deref()).await;

    let result = dispatch(cli, config).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli, mut config: HydrowatchConfig) -> anyhow::Result<()> {
    let json = cli.json;

    match cli.command {
        Commands::Serve { port, host } => {
            cli::apply_serve_overrides(&mut config.control, host, port);
            serve(config, json).await?;
        }

        Commands::Station {
            id,
            neighbors,
            sensors,
            interval,
        } => {
            cli::apply_agent_overrides(&mut config.agent, cli.url, neighbors, sensors, interval);
            cli::station::run_station(StationId::from(id), config.agent, shutdown_signal(), json)
                .await?;
        }

        Commands::Stations => {
            let client = rpc_client(cli.url, &config)?;
            cli::stations::list_stations(&client, json).await?;
        }

        Commands::Show { id } => {
            let client = rpc_client(cli.url, &config)?;
            cli::stations::show_station(&client, &id, json).await?;
        }

        Commands::Neighbors { command } => {
            let client = rpc_client(cli.url, &config)?;
            match command {
                NeighborsCommand::List { id } => {
                    cli::stations::list_neighbors(&client, &id, json).await?;
                }
                NeighborsCommand::Add { id, neighbor } => {
                    cli::stations::add_neighbor(&client, &id, &neighbor, json).await?;
                }
            }
        }

        // Handled before config loading.
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn rpc_client(url: Option<String>, config: &HydrowatchConfig) -> anyhow::Result<HttpControlClient> {
    let base_url = url.unwrap_or_else(|| config.agent.control_url.clone());
    HttpControlClient::new(&base_url, config.agent.rpc_timeout())
        .with_context(|| format!("invalid control service URL '{base_url}'"))
}

async fn serve(config: HydrowatchConfig, json: bool) -> anyhow::Result<()> {
    let addr = config.control.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let cancel = CancellationToken::new();
    let (state, tasks) = AppState::init(&config.control, cancel.clone());
    let router = http::router::build_router(state);

    if json {
        println!("{}", serde_json::json!({ "listening": addr }));
    } else {
        println!();
        println!(
            "  {} Hydrowatch control service listening on {}",
            console::style("~").cyan().bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!();
    }
    tracing::info!(%addr, "control service started");

    // Cancelling first ends SSE and WebSocket streams so the graceful
    // shutdown does not wait on them.
    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "background task ended abnormally");
        }
    }
    tracing::info!("control service stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
