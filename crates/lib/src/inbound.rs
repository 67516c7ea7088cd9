//! Inbound pipeline: vendor delivery notification -> bus message.
//!
//! Every request ends in exactly one of three terminal paths (decode error,
//! bad fields, accepted). Each path yields the HTTP reply plus the
//! health-status event it owes; the HTTP layer sends the reply and emits the
//! status alongside it, so a slow bus never delays the vendor's response.

use crate::bus::{
    Component, Health, InboundSms, StatusEvent, TransportBus, TransportMetadata, TRANSPORT_TYPE,
};
use crate::fields::{split_fields, INBOUND_FIELDS};
use serde_json::json;
use std::collections::HashMap;

/// Raw inbound request as handed over by the HTTP layer. `content` is the
/// undecoded query string (GET) or body (POST).
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub uri: String,
    pub method: String,
    pub path: String,
    pub content: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl InboundRequest {
    /// Request description used in 400 bodies and status-event details.
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "uri": self.uri,
            "method": self.method,
            "path": self.path,
            "content": String::from_utf8_lossy(&self.content),
            "headers": self.headers,
        })
    }
}

/// Reply for the originating HTTP request.
#[derive(Debug, Clone)]
pub struct InboundReply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl InboundReply {
    fn ok() -> Self {
        Self {
            status: 200,
            body: json!({}),
        }
    }

    fn bad_request(body: serde_json::Value) -> Self {
        Self { status: 400, body }
    }
}

/// Terminal outcome of one inbound request: the HTTP reply plus the
/// health-status event owed for it. The caller emits the status; only the
/// bus publish on the accepted path happens inside the adapter, because the
/// 200 must not be sent for a message the bus never received.
#[derive(Debug)]
pub struct InboundOutcome {
    pub reply: InboundReply,
    pub status: Option<StatusEvent>,
}

/// Decode the raw content into a field map. None when the bytes are not
/// UTF-8 or the form encoding hides invalid UTF-8 behind percent escapes.
fn decode_fields(content: &[u8]) -> Option<HashMap<String, String>> {
    let text = std::str::from_utf8(content).ok()?;
    let mut values = HashMap::new();
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        values.insert(decode_component(name)?, decode_component(value)?);
    }
    Some(values)
}

fn decode_component(raw: &str) -> Option<String> {
    let unplussed = raw.replace('+', " ");
    percent_encoding::percent_decode_str(&unplussed)
        .decode_utf8()
        .ok()
        .map(|c| c.into_owned())
}

/// Handle one inbound delivery notification. `message_id` is the correlation
/// id assigned by the HTTP layer and becomes the bus message id on success.
pub async fn handle_inbound(
    message_id: &str,
    request: &InboundRequest,
    bus: &dyn TransportBus,
) -> InboundOutcome {
    let values = match decode_fields(&request.content) {
        Some(v) => v,
        None => return decode_error(request),
    };
    let (vals, missing) = split_fields(&values, INBOUND_FIELDS);
    if !missing.is_empty() {
        return bad_request_fields(request, missing);
    }
    accept(message_id, &vals, bus).await
}

fn decode_error(request: &InboundRequest) -> InboundOutcome {
    let req = request.describe();
    log::error!("bad request encoding: {}", req);
    InboundOutcome {
        reply: InboundReply::bad_request(json!({ "invalid_request": req })),
        status: Some(
            StatusEvent::new(
                Component::Inbound,
                Health::Down,
                "request_decode_error",
                "Bad request encoding",
            )
            .with_details(json!({ "request": req })),
        ),
    }
}

fn bad_request_fields(request: &InboundRequest, missing: Vec<String>) -> InboundOutcome {
    let req = request.describe();
    let errors = json!({ "missing_parameter": missing });
    log::error!("bad request fields for inbound message: {} {}", errors, req);
    InboundOutcome {
        reply: InboundReply::bad_request(errors.clone()),
        status: Some(
            StatusEvent::new(
                Component::Inbound,
                Health::Down,
                "request_bad_fields",
                "Bad request fields",
            )
            .with_details(json!({ "request": req, "errors": errors })),
        ),
    }
}

async fn accept(
    message_id: &str,
    vals: &HashMap<String, String>,
    bus: &dyn TransportBus,
) -> InboundOutcome {
    // Publish before replying 200: the vendor must not see an accept for a
    // message the bus never received.
    if let Err(e) = bus.publish_inbound(bus_message(message_id, vals)).await {
        log::error!("inbound publish failed: {}", e);
        return InboundOutcome {
            reply: InboundReply {
                status: 500,
                body: json!({}),
            },
            status: None,
        };
    }
    InboundOutcome {
        reply: InboundReply::ok(),
        status: Some(StatusEvent::new(
            Component::Inbound,
            Health::Ok,
            "request_success",
            "Request successful",
        )),
    }
}

fn bus_message(message_id: &str, vals: &HashMap<String, String>) -> InboundSms {
    let field = |name: &str| vals.get(name).cloned().unwrap_or_default();
    InboundSms {
        message_id: message_id.to_string(),
        from_addr: field("sender"),
        from_addr_type: "msisdn".to_string(),
        to_addr: field("receiver"),
        content: field("msgdata"),
        provider: field("operator"),
        transport_type: TRANSPORT_TYPE.to_string(),
        transport_metadata: TransportMetadata::with_msgid(field("msgid")),
    }
}
