use anyhow::{Context, Result};
use lib_common::core::{Broadcaster, Registry};
use lib_common::markets::{QuoteSource, YahooQuoteSource};
use servers::quote_logic::{config, downstream, logger, state};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    // Explicitly install the default crypto provider for rustls
    let _ = rustls::crypto::ring::default_provider().install_default();

    let settings = config::load_config()?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;
    log::info!(
        "Starting quote server on {} (period {:?}, source {})",
        settings.listen_addr,
        settings.broadcast_period,
        settings.source_url
    );

    let registry = Arc::new(Registry::new());
    let source: Arc<dyn QuoteSource> = Arc::new(
        YahooQuoteSource::new(&settings.source_url, settings.source_timeout)
            .context("Failed to build the quote source client")?,
    );
    let broadcaster = Broadcaster::new(registry.clone(), source, settings.broadcast_period);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let app_state = state::AppState::new(registry);

    let broadcast_rx = shutdown_tx.subscribe();
    let broadcaster_handle = tokio::spawn(async move { broadcaster.run(broadcast_rx).await });

    let mut downstream_handle = tokio::spawn(downstream::run(
        settings.clone(),
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));

    // Wait for a shutdown signal, or for the server to stop on its own
    let early_exit = tokio::select! {
        _ = shutdown_signal() => None,
        res = &mut downstream_handle => Some(res),
    };

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());

    let outcome = match early_exit {
        Some(res) => res.context("Downstream task panicked")?,
        None => downstream_handle.await.context("Downstream task panicked")?,
    };
    let _ = broadcaster_handle.await;

    match outcome {
        Ok(()) => {
            log::info!("Shutdown complete.");
            Ok(())
        }
        Err(e) => {
            log::error!("Downstream server failed: {:#}", e);
            Err(e)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // On non-unix platforms, just wait forever.
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}
