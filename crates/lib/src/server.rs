//! Transport HTTP server: receives vendor delivery notifications and runs
//! the outbound worker.

use crate::bus::{OutboundSms, TransportBus};
use crate::config::Config;
use crate::inbound::{handle_inbound, InboundRequest};
use crate::outbound::run_outbound_worker;
use crate::vendor::VendorClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared state for the inbound HTTP handlers.
#[derive(Clone)]
pub struct TransportState {
    pub bus: Arc<dyn TransportBus>,
}

/// Run the transport: bind the inbound listener, start the outbound worker,
/// serve until SIGINT/SIGTERM, then await the worker (it exits when the
/// outbound channel closes).
pub async fn run_transport(
    config: Config,
    bus: Arc<dyn TransportBus>,
    outbound_rx: mpsc::Receiver<OutboundSms>,
) -> Result<()> {
    let missing = config.validate();
    if !missing.is_empty() {
        anyhow::bail!("missing required config options: {}", missing.join(", "));
    }
    let creds = config
        .credentials()
        .context("resolving vendor credentials")?;
    let url = config
        .outbound_url
        .clone()
        .context("resolving outbound url")?;
    let sender = Arc::new(VendorClient::new(url, config.outbound_request_timeout));
    let worker = tokio::spawn(run_outbound_worker(
        outbound_rx,
        creds,
        sender,
        bus.clone(),
    ));

    let state = TransportState { bus };
    let app = Router::new()
        .route("/", get(health_http))
        .route("/sms/inbound", get(inbound_http).post(inbound_http))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("transport listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("transport server exited")?;

    let _ = worker.await;
    log::info!("transport stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET|POST /sms/inbound — vendor delivery notification. A fresh correlation
/// id ties the request to the bus message and becomes its message id.
async fn inbound_http(
    State(state): State<TransportState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message_id = uuid::Uuid::new_v4().to_string();
    let request = build_request(&method, &uri, &headers, &body);
    let outcome = handle_inbound(&message_id, &request, state.bus.as_ref()).await;
    // Emit the status from a detached task: the vendor's reply must not wait
    // on bus delivery.
    if let Some(event) = outcome.status {
        let bus = state.bus.clone();
        tokio::spawn(async move {
            if let Err(e) = bus.add_status(event).await {
                log::warn!("inbound status emission failed: {}", e);
            }
        });
    }
    let status =
        StatusCode::from_u16(outcome.reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.reply.body)).into_response()
}

/// Fields arrive in the query string on GET and in the body on POST; the
/// adapter gets whichever carries them, undecoded.
fn build_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> InboundRequest {
    let content = if body.is_empty() {
        uri.query().unwrap_or_default().as_bytes().to_vec()
    } else {
        body.to_vec()
    };
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                String::from_utf8_lossy(v.as_bytes()).to_string(),
            )
        })
        .collect();
    InboundRequest {
        uri: uri.to_string(),
        method: method.to_string(),
        path: uri.path().to_string(),
        content,
        headers: header_map,
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http() -> Json<serde_json::Value> {
    Json(json!({
        "transport": "vas2nets-sms",
        "runtime": "running",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::test_support::{BusRecord, RecordingBus};
    use std::time::Duration;

    #[tokio::test]
    async fn inbound_reply_does_not_wait_on_status_emission() {
        let bus = Arc::new(RecordingBus::default());
        let state = TransportState { bus: bus.clone() };
        let uri: Uri = "/sms/inbound?sender=%2B2341234&msgid=abc"
            .parse()
            .expect("uri");

        let response = inbound_http(
            State(state),
            Method::GET,
            uri,
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The status event arrives from the detached task shortly after the
        // reply is already in hand.
        for _ in 0..100 {
            let records = bus.take();
            if let Some(BusRecord::Status(event)) = records.first() {
                assert_eq!(event.event_type, "request_bad_fields");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("status event never reached the bus");
    }

    #[test]
    fn get_request_content_comes_from_the_query_string() {
        let uri: Uri = "/sms/inbound?sender=123&msgid=a".parse().expect("uri");
        let request = build_request(&Method::GET, &uri, &HeaderMap::new(), &Bytes::new());
        assert_eq!(request.content, b"sender=123&msgid=a");
        assert_eq!(request.path, "/sms/inbound");
        assert_eq!(request.method, "GET");
    }

    #[test]
    fn post_request_content_comes_from_the_body() {
        let uri: Uri = "/sms/inbound".parse().expect("uri");
        let body = Bytes::from_static(b"sender=123");
        let request = build_request(&Method::POST, &uri, &HeaderMap::new(), &body);
        assert_eq!(request.content, b"sender=123");
    }
}
