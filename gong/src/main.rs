use nexus_gong::config::ExtensionConfig;
use nexus_gong::ops::{self, SharedState};
use nexus_gong::state::AppState;
use nexus_gong::types::{OutboundDelivery, WEBHOOK_MESSAGE_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info, warn};

// ─── JSON-RPC wire types ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

fn result_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: Some(result),
        error: None,
        id,
    }
}

fn ok_response(id: Value, data: Value) -> JsonRpcResponse {
    result_response(
        id,
        serde_json::json!({
            "success": true,
            "data": data,
            "message": null
        }),
    )
}

fn err_response(id: Value, code: i64, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: None,
        error: Some(JsonRpcError { code, message }),
        id,
    }
}

/// Shared handle to the initialized state. Set once during `initialize`.
static STATE: OnceCell<SharedState> = OnceCell::const_new();

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    init_tracing();
    let handle = tokio::runtime::Handle::current();

    // Stdin loop on a blocking thread to avoid blocking the async runtime.
    let stdio = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut line = String::new();

        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                _ => {}
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let resp =
                        err_response(Value::Number(0.into()), -32700, format!("Parse error: {e}"));
                    emit_line(&mut out, &resp);
                    continue;
                }
            };

            let is_shutdown = request.method == "shutdown";

            let response = handle.block_on(handle_request(&request, &mut out));
            emit_line(&mut out, &response);

            if is_shutdown {
                break;
            }
        }
    });

    if let Err(e) = stdio.await {
        error!(error = %e, "stdio loop terminated abnormally");
    }
}

/// Logs go to stderr; stdout carries the host protocol.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn emit_line(out: &mut impl Write, value: &impl Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
        Err(e) => error!(error = %e, "failed to serialize outgoing message"),
    }
}

// ─── Request dispatch ─────────────────────────────────────────────────────────

async fn handle_request(req: &JsonRpcRequest, out: &mut impl Write) -> JsonRpcResponse {
    if let Some(state) = STATE.get() {
        drain_outbox(state, &mut *out).await;
    }

    match req.method.as_str() {
        "initialize" => handle_initialize(req).await,
        "shutdown" => {
            info!("shutdown requested");
            result_response(req.id.clone(), serde_json::json!({}))
        }
        "execute" => handle_execute(req).await,
        _ => err_response(req.id.clone(), -32601, format!("Unknown method: {}", req.method)),
    }
}

async fn handle_initialize(req: &JsonRpcRequest) -> JsonRpcResponse {
    if let Some(state) = STATE.get() {
        let st = state.read().await;
        return result_response(req.id.clone(), ops::status_json(&st));
    }

    let config = match ExtensionConfig::from_params(&req.params) {
        Ok(c) => c,
        Err(e) => return err_response(req.id.clone(), e.rpc_code(), e.to_string()),
    };

    let mut app_state = match AppState::open(config).await {
        Ok(s) => s,
        Err(e) => {
            return err_response(req.id.clone(), -32000, format!("Initialize failed: {e}"));
        }
    };
    app_state.sync().await;
    let result = ops::status_json(&app_state);

    // If already initialized, this is a no-op (OnceCell).
    let _ = STATE.set(Arc::new(RwLock::new(app_state)));
    result_response(req.id.clone(), result)
}

async fn handle_execute(req: &JsonRpcRequest) -> JsonRpcResponse {
    let state = match STATE.get() {
        Some(s) => s.clone(),
        None => {
            return err_response(
                req.id.clone(),
                -32000,
                "Extension not initialized. Send 'initialize' first.".into(),
            )
        }
    };

    let operation = req
        .params
        .get("operation")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let input = req
        .params
        .get("input")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    match ops::execute(operation, &input, &state).await {
        Ok(data) => ok_response(req.id.clone(), data),
        Err(e) => err_response(req.id.clone(), e.rpc_code(), e.to_string()),
    }
}

// ─── Outbox draining ──────────────────────────────────────────────────────────

/// Publish deliveries accepted by the router as `event.publish` calls.
/// Must be called while the host is in its read loop.
async fn drain_outbox(state: &SharedState, out: &mut impl Write) {
    let pending: Vec<OutboundDelivery> = state.write().await.take_outbox();
    if pending.is_empty() {
        return;
    }

    static NEXT_ID: AtomicU64 = AtomicU64::new(20000);
    let stdin = io::stdin();

    for delivery in &pending {
        let call_id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "event.publish",
            "params": {
                "type": WEBHOOK_MESSAGE_TYPE,
                "subject": delivery.category,
                "recipients": delivery.subscriber_ids,
                "data": delivery.message(),
            },
            "id": call_id,
        });
        emit_line(&mut *out, &req);

        // Read back the host's response to keep the protocol in sync
        let mut line = String::new();
        if let Err(e) = stdin.lock().read_line(&mut line) {
            warn!(error = %e, "failed to read event.publish reply");
        }
    }
}
