//! Dashboard HTTP and WebSocket server
//!
//! Routes:
//!
//! - `GET /ws`: initial `state` frame, then every engine event as
//!   `{"type": ..., "data": ...}`
//! - `GET /api/state`, `GET /api/status`
//! - `POST /api/start`, `POST /api/stop`: 409 when the transition is illegal
//! - `GET /health`

use crate::client::{Client, ClientManager, Frame};
use crate::config::DashboardConfig;
use crate::error::Result;
use confluence_strategy::{ConfluenceEngine, EngineEvent, Subscription};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

/// Main dashboard server
pub struct DashboardServer {
    config: DashboardConfig,
    engine: ConfluenceEngine,
    client_manager: Arc<ClientManager>,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, engine: ConfluenceEngine) -> Self {
        let client_manager = Arc::new(ClientManager::new(config.max_connections));

        Self {
            config,
            engine,
            client_manager,
        }
    }

    pub fn client_manager(&self) -> &Arc<ClientManager> {
        &self.client_manager
    }

    /// Serve until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = self.config.socket_addr()?;

        let forwarder = self.spawn_forwarder().await;
        let heartbeat = self.start_heartbeat_task();

        let signal = async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        };

        let routes = self.routes();
        if self.config.enable_cors {
            let cors = warp::cors()
                .allow_any_origin()
                .allow_methods(vec!["GET", "POST"]);
            let (bound, server) =
                warp::serve(routes.with(cors)).try_bind_with_graceful_shutdown(addr, signal)?;
            info!("Dashboard listening on {}", bound);
            server.await;
        } else {
            let (bound, server) =
                warp::serve(routes).try_bind_with_graceful_shutdown(addr, signal)?;
            info!("Dashboard listening on {}", bound);
            server.await;
        }

        forwarder.abort();
        if let Some(heartbeat) = heartbeat {
            heartbeat.abort();
        }
        info!("Dashboard server stopped");
        Ok(())
    }

    /// Subscribe to the engine now and relay its events to every client
    pub async fn spawn_forwarder(&self) -> JoinHandle<()> {
        let subscription = self.engine.subscribe().await;
        let client_manager = self.client_manager.clone();
        tokio::spawn(forward_events(subscription, client_manager))
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let engine = self.engine.clone();
        let with_engine = warp::any().map(move || engine.clone());
        let client_manager = self.client_manager.clone();
        let with_clients = warp::any().map(move || client_manager.clone());
        let buffer = self.config.client_buffer_size;

        let ws_route = warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .and(with_engine.clone())
            .and(with_clients)
            .map(move |ws: Ws, engine: ConfluenceEngine, clients: Arc<ClientManager>| {
                ws.on_upgrade(move |socket| {
                    handle_websocket_connection(engine, clients, buffer, socket)
                })
            });

        let state_route = warp::path!("api" / "state")
            .and(warp::get())
            .and(with_engine.clone())
            .and_then(api_state);

        let status_route = warp::path!("api" / "status")
            .and(warp::get())
            .and(with_engine.clone())
            .and_then(api_status);

        let start_route = warp::path!("api" / "start")
            .and(warp::post())
            .and(with_engine.clone())
            .and_then(api_start);

        let stop_route = warp::path!("api" / "stop")
            .and(warp::post())
            .and(with_engine)
            .and_then(api_stop);

        let health_route = warp::path("health")
            .and(warp::path::end())
            .map(|| warp::reply::with_status("OK", StatusCode::OK));

        ws_route
            .or(state_route)
            .or(status_route)
            .or(start_route)
            .or(stop_route)
            .or(health_route)
    }

    fn start_heartbeat_task(&self) -> Option<JoinHandle<()>> {
        if self.config.heartbeat_interval_secs == 0 {
            return None;
        }

        let client_manager = self.client_manager.clone();
        let engine = self.engine.clone();
        let interval_secs = self.config.heartbeat_interval_secs;

        Some(tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(interval_secs));

            loop {
                interval.tick().await;

                let heartbeat = json!({
                    "type": "heartbeat",
                    "data": {
                        "timestamp": engine.now(),
                        "clients": client_manager.client_count().await,
                    }
                });
                let delivered = client_manager.broadcast(Frame::from(heartbeat.to_string())).await;
                debug!("Sent heartbeat to {} clients", delivered);
            }
        }))
    }
}

/// Relay engine events until the engine drops the subscription
async fn forward_events(mut subscription: Subscription, client_manager: Arc<ClientManager>) {
    info!(subscriber = %subscription.id, "Event forwarder started");

    while let Some(event) = subscription.receiver.recv().await {
        match serde_json::to_string(&event) {
            Ok(text) => {
                client_manager.broadcast(Frame::from(text)).await;
            }
            Err(e) => error!("Failed to serialize {} event: {}", event.kind(), e),
        }
    }

    info!("Event forwarder stopped");
}

fn json_reply<T: serde::Serialize>(
    body: &T,
    status: StatusCode,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(body), status)
}

async fn api_state(engine: ConfluenceEngine) -> std::result::Result<impl Reply, Infallible> {
    let state = engine.snapshot().await;
    Ok(json_reply(&state, StatusCode::OK))
}

async fn api_status(engine: ConfluenceEngine) -> std::result::Result<impl Reply, Infallible> {
    Ok(match engine.status().await {
        Ok(report) => json_reply(&report, StatusCode::OK),
        Err(e) => {
            error!("Status report failed: {}", e);
            json_reply(&json!({ "error": e.to_string() }), StatusCode::INTERNAL_SERVER_ERROR)
        }
    })
}

async fn api_start(engine: ConfluenceEngine) -> std::result::Result<impl Reply, Infallible> {
    Ok(match engine.start().await {
        Ok(()) => json_reply(&json!({ "success": true, "running": true }), StatusCode::OK),
        Err(e) => json_reply(&json!({ "error": e.to_string() }), StatusCode::CONFLICT),
    })
}

async fn api_stop(engine: ConfluenceEngine) -> std::result::Result<impl Reply, Infallible> {
    Ok(match engine.stop().await {
        Ok(()) => json_reply(&json!({ "success": true, "running": false }), StatusCode::OK),
        Err(e) => json_reply(&json!({ "error": e.to_string() }), StatusCode::CONFLICT),
    })
}

async fn handle_websocket_connection(
    engine: ConfluenceEngine,
    client_manager: Arc<ClientManager>,
    buffer: usize,
    ws: WebSocket,
) {
    info!("New WebSocket connection established");

    let (tx, rx) = mpsc::channel::<Frame>(buffer);
    let client = Client::new(tx);
    let client_id = client.id;

    if let Err(e) = client_manager.add_client(client).await {
        warn!("Rejected WebSocket connection: {}", e);
        let _ = ws.close().await;
        return;
    }

    if let Err(e) = handle_client_connection(engine, client_id, rx, ws).await {
        warn!("WebSocket connection error for client {}: {}", client_id, e);
    }

    client_manager.remove_client(client_id).await;
}

async fn handle_client_connection(
    engine: ConfluenceEngine,
    client_id: uuid::Uuid,
    mut rx: mpsc::Receiver<Frame>,
    ws: WebSocket,
) -> Result<()> {
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let initial = EngineEvent::State(Arc::new(engine.snapshot().await));
    ws_sender.send(Message::text(serde_json::to_string(&initial)?)).await?;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(frame) => ws_sender.send(Message::text(&*frame)).await?,
                    None => {
                        info!("Client {} dropped by broadcaster", client_id);
                        break;
                    }
                }
            }

            ws_msg = ws_receiver.next() => {
                match ws_msg {
                    Some(Ok(msg)) if msg.is_close() => {
                        info!("Client {} disconnected", client_id);
                        break;
                    }
                    Some(Ok(msg)) => {
                        if let Ok(text) = msg.to_str() {
                            debug!("Ignoring message from client {}: {}", client_id, text);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("WebSocket stream closed for client {}", client_id);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
