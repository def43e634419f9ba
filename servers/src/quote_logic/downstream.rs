use crate::quote_logic::config::Settings;
use crate::quote_logic::model::{INVALID_SYMBOL, MISSING_SYMBOL, StockQuery};
use crate::quote_logic::session::WsSession;
use crate::quote_logic::state::AppState;
use anyhow::Context;
use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_server::tls_rustls::RustlsConfig;
use futures_util::StreamExt;
use lib_common::core::Session;
use lib_common::markets::{SymbolError, normalize_symbol};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/stock", get(stock_ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until `shutdown` fires.
///
/// Failing to bind, or to load the TLS material, is the only fatal error.
pub async fn run(settings: Settings, app_state: AppState, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
    let app = router(app_state);
    let addr = settings.listen_addr;

    if let Some(tls) = settings.tls {
        let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .with_context(|| format!("Failed to load TLS configuration from {}", tls.cert_path.display()))?;

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
            signal_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        log::info!("Downstream server listening on wss://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .with_context(|| format!("Failed to serve on {}", addr))?;
        Ok(())
    } else {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        log::info!("Downstream server listening on ws://{}", addr);
        serve(listener, app, shutdown).await
    }
}

/// Serves `app` on an already bound listener.
pub async fn serve(listener: TcpListener, app: Router, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            log::info!("Downstream server shutting down.");
        })
        .await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn stock_ws_handler(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // The symbol is checked before the upgrade so a bad request is never upgraded
    let symbol = match normalize_symbol(query.symbol.as_deref().unwrap_or_default()) {
        Ok(symbol) => symbol,
        Err(SymbolError::Missing) => return (StatusCode::BAD_REQUEST, MISSING_SYMBOL).into_response(),
        Err(e) => return (StatusCode::BAD_REQUEST, format!("{}: {}", INVALID_SYMBOL, e)).into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            log::warn!("upgrade: {}", rejection);
            return rejection.into_response();
        }
    };

    ws.on_failed_upgrade(|e| log::warn!("upgrade: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, state, symbol))
}

async fn handle_socket(socket: WebSocket, state: AppState, symbol: String) {
    let (sink, mut stream) = socket.split();
    let session = Arc::new(WsSession::new(sink));
    let client_id = session.id();

    let subscription = state.registry.register(session.clone(), symbol);
    let guard = state.registry.guard(subscription);
    log::info!("Client {} subscribed to {}", client_id, guard.item());

    // Nothing inbound is processed; reading only detects the peer going away
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::info!("read: client {}: {}", client_id, e);
                break;
            }
        }
    }

    // Deregister before closing
    drop(guard);
    session.close().await;
    log::info!("Client {} disconnected", client_id);
}
