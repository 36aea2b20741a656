use crate::error::{Error, Result};
use crate::router::{WebhookRouter, MSG_INTERNAL_ERROR};
use crate::transport::{Acknowledgement, HostTransport, RequestGuard};
use crate::types::InboundEvent;
use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const WEBHOOK_PATH: &str = "/webhook";

#[derive(Clone)]
pub struct ServerState {
    pub router: WebhookRouter,
    pub transport: Arc<HostTransport>,
}

/// Axum app for Gong webhook ingress. Any path ending in `/webhook` is
/// accepted; everything else is a 404.
pub fn app(state: ServerState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, any(handle_webhook))
        .fallback(handle_fallback)
        .with_state(state)
}

/// Bind the ingress server and serve it in the background. Returns the
/// bound port.
pub async fn start(bind_addr: SocketAddr, state: ServerState) -> Result<u16> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| Error::Transport(format!("failed to bind HTTP server: {e}")))?;
    let port = listener.local_addr()?.port();
    info!(port, "webhook ingress listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app(state)).await {
            error!(error = %e, "HTTP server error");
        }
    });

    Ok(port)
}

async fn handle_fallback(State(state): State<ServerState>, uri: Uri, body: Bytes) -> Response {
    if uri.path().ends_with(WEBHOOK_PATH) {
        return receive(&state, body).await;
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
        .into_response()
}

async fn handle_webhook(State(state): State<ServerState>, body: Bytes) -> Response {
    receive(&state, body).await
}

async fn receive(state: &ServerState, body: Bytes) -> Response {
    let (request_id, acked) = state.transport.open_request().await;
    let _guard = RequestGuard::new(state.transport.clone(), request_id.clone());

    let body: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "undecodable webhook body");
            return into_response(Acknowledgement::server_error(MSG_INTERNAL_ERROR));
        }
    };

    state.router.route(InboundEvent { body, request_id }).await;

    match acked.await {
        Ok(ack) => into_response(ack),
        Err(_) => into_response(Acknowledgement::server_error(MSG_INTERNAL_ERROR)),
    }
}

fn into_response(ack: Acknowledgement) -> Response {
    let status = StatusCode::from_u16(ack.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ack.body)).into_response()
}
