use grid_monitor::{
    config::{Config, LogFormat},
    operator::{relay_target, OperatorCommand},
    view::Dashboard,
    ChannelManager, TelemetryStore, WsTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config = Config::load(&config_path)?;

    init_tracing(config.logging.format);
    info!("Configuration loaded from: {}", config_path);

    // wss:// endpoints need a process-wide crypto provider; an earlier install is fine
    let _ = rustls::crypto::ring::default_provider().install_default();

    let store = TelemetryStore::new();
    let channel = ChannelManager::from_config(WsTransport, &config.channel);
    {
        let store = store.clone();
        channel.on_snapshot(move |snapshot| store.apply_inbound(snapshot));
    }

    let mut states = channel.state_changes();
    let mut snapshots = store.subscribe();

    info!(url = %channel.url(), "Starting grid monitor");
    channel.connect();

    println!("{}", Dashboard::new(&store.current()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Ok(()) = states.changed() => {
                let state = *states.borrow_and_update();
                info!(%state, "Channel state changed");
            }
            Ok(()) = snapshots.changed() => {
                let snapshot = snapshots.borrow_and_update().clone();
                println!("\n{}", Dashboard::new(&snapshot));
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match OperatorCommand::parse(&line) {
                        Ok(OperatorCommand::Quit) => break,
                        Ok(OperatorCommand::Status) => {
                            println!("Channel: {}", channel.state());
                            if let Some(at) = store.last_update() {
                                println!("Last update: {}", at.to_rfc3339());
                            }
                            println!("{}", Dashboard::new(&store.current()));
                        }
                        Ok(OperatorCommand::Relay { index, action }) => {
                            let desired = relay_target(index, action, &store.current());
                            match store.request_relay_change(index, desired, &channel) {
                                Ok(dispatch) => info!(circuit = index + 1, state = desired, ?dispatch, "Relay request handled"),
                                Err(e) => warn!(circuit = index + 1, error = %e, "Relay request rejected"),
                            }
                        }
                        Err(e) => warn!(error = %e, "Unrecognised operator command"),
                    }
                }
                Ok(None) => {
                    info!("Operator input closed, running until signalled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read operator input");
                    stdin_open = false;
                }
            },
        }
    }

    channel.close();
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grid_monitor=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so the dashboard owns stdout
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
