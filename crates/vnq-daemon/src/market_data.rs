//! Composition-root WebSocket market-data loop.
//!
//! `vnq_broker::MarketDataClient` only tracks connection state and
//! subscriptions; owning the socket and driving reconnects is the
//! composition root's job, per its own doc comment ("called by the
//! composition root on a successful handshake").

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use vnq_broker::{parse_tick_message, ConnectionState, MarketDataClient};
use vnq_resilience::ShutdownSignal;
use vnq_schemas::{Symbol, Tick};

/// Connect to `client`'s URL, subscribe to `symbols`, and forward parsed
/// ticks to `out` until `shutdown` fires or the client is marked fatal.
/// Reconnects with the client's own backoff on every drop.
pub async fn run_market_data_task(
    client: Arc<MarketDataClient>,
    symbols: Vec<Symbol>,
    out: mpsc::Sender<Tick>,
    shutdown: ShutdownSignal,
) {
    client.record_subscription(symbols.clone());

    loop {
        if shutdown.is_shutting_down() {
            tracing::info!("market data task stopping on shutdown signal");
            break;
        }

        client.mark_connecting();
        match tokio_tungstenite::connect_async(client.url()).await {
            Ok((ws_stream, _response)) => {
                client.mark_connected();
                tracing::info!(url = client.url(), "market data socket connected");

                let (mut write, mut read) = ws_stream.split();

                let sub_msg = serde_json::json!({ "action": "subscribe", "symbols": symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>() });
                if let Ok(text) = serde_json::to_string(&sub_msg) {
                    let _ = write.send(Message::Text(text)).await;
                }

                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown.wait() => {
                            tracing::info!("market data task stopping mid-stream on shutdown signal");
                            return;
                        }
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Some(tick) = parse_tick_message(&text) {
                                        if out.send(tick).await.is_err() {
                                            tracing::warn!("ingest channel closed, stopping market data task");
                                            return;
                                        }
                                    }
                                }
                                Some(Ok(Message::Ping(payload))) => {
                                    let _ = write.send(Message::Pong(payload)).await;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(err)) => {
                                    tracing::warn!(error = %err, "market data socket read error");
                                    break;
                                }
                                None => {
                                    tracing::warn!("market data socket closed by peer");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "market data socket connect failed");
                if client.state() == ConnectionState::Fatal {
                    break;
                }
            }
        }

        let delay = client.on_disconnect();
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(delay.max(Duration::from_millis(100))) => {}
        }
    }
}
