//! Sourcing service
//!
//! Two listeners share one process: a warp HTTP server for task
//! submission and queries, and a raw WebSocket listener for the
//! notification channel. Every connected channel client receives every
//! task's updates; correlation with a submitted task happens out of band.

pub mod hub;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::Filter;

use crate::config::{Config, LlmEndpointConfig};
use crate::protocol::{SourcingRequest, TaskStarted};
use crate::store::ResultStore;
use crate::worker;
use hub::UpdateHub;

pub struct AppState {
    pub hub: UpdateHub,
    pub store: Arc<ResultStore>,
    pub llm: LlmEndpointConfig,
}

/// Run both listeners until the process is stopped.
pub async fn start_server(config: Config) -> Result<()> {
    let hub = UpdateHub::new(256);
    let store = Arc::new(ResultStore::new_in(config.data_dir()?));
    let state = Arc::new(AppState {
        hub: hub.clone(),
        store,
        llm: config.llm.clone(),
    });

    let notify_addr = config.server.notify_addr.clone();
    let channel_task = tokio::spawn(async move {
        if let Err(e) = run_channel_listener(&notify_addr, hub).await {
            tracing::error!("channel listener failed: {:#}", e);
        }
    });

    let http_addr: SocketAddr = config
        .server
        .http_addr
        .parse()
        .with_context(|| format!("Invalid http_addr: {}", config.server.http_addr))?;

    let sourcing = warp::path("sourcing")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .map(|request: SourcingRequest, state: Arc<AppState>| {
            let task_id = Uuid::new_v4().to_string();
            tracing::info!("accepted sourcing task {}: {}", task_id, request.query);

            tokio::spawn(worker::run_sourcing_task(
                task_id.clone(),
                request.query.clone(),
                state.hub.clone(),
                state.store.clone(),
                state.llm.clone(),
            ));

            warp::reply::with_status(
                warp::reply::json(&TaskStarted {
                    task_id,
                    status: "started".to_string(),
                    query: request.query,
                }),
                StatusCode::ACCEPTED,
            )
        });

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "ok"})));

    let results = warp::path("results")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .map(|state: Arc<AppState>| match state.store.load() {
            Ok(records_file) => warp::reply::with_status(
                warp::reply::json(&records_file.records),
                StatusCode::OK,
            ),
            Err(e) => {
                tracing::error!("failed to load results: {:#}", e);
                warp::reply::with_status(
                    warp::reply::json(&json!({"error": e.to_string()})),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            }
        });

    let routes = sourcing.or(health).or(results);

    tracing::info!("submission endpoint listening on http://{}", http_addr);
    warp::serve(routes).run(http_addr).await;

    channel_task.abort();
    Ok(())
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Accept channel connections and fan hub frames out to each of them.
async fn run_channel_listener(addr: &str, hub: UpdateHub) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind channel listener on {}", addr))?;

    tracing::info!("notification channel listening on ws://{}", addr);

    while let Ok((stream, peer)) = listener.accept().await {
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Ok(ws_stream) = accept_async(stream).await {
                tracing::debug!("channel client connected: {}", peer);
                handle_connection(ws_stream, hub).await;
                tracing::debug!("channel client disconnected: {}", peer);
            }
        });
    }

    Ok(())
}

async fn handle_connection(
    ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    hub: UpdateHub,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut updates = hub.subscribe();

    // Task to forward hub frames to this subscriber
    let send_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(frame) => {
                    if ws_sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("channel subscriber lagged, {} frames dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Inbound client frames carry no meaning; read and discard until the
    // peer hangs up.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    send_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChannelEvent, NotificationChannel};

    #[tokio::test]
    async fn listener_forwards_hub_frames_to_connected_clients() {
        let hub = UpdateHub::new(16);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let accept_hub = hub.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let hub = accept_hub.clone();
                tokio::spawn(async move {
                    if let Ok(ws_stream) = accept_async(stream).await {
                        handle_connection(ws_stream, hub).await;
                    }
                });
            }
        });

        let url = format!("ws://{}", addr);
        let mut channel = NotificationChannel::connect(&url).await.expect("connect");
        assert_eq!(channel.next_event().await, Some(ChannelEvent::Opened));

        // Wait for the subscription before publishing.
        while hub.subscriber_count() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        hub.publish_line("working on it");
        assert_eq!(
            channel.next_event().await,
            Some(ChannelEvent::Frame("working on it".to_string()))
        );
    }
}
