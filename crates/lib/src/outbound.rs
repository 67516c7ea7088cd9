//! Outbound pipeline: bus send request -> vendor HTTP call -> ack/nack.
//!
//! One attempt per message, no retry scheduling: a caller wanting a retry
//! resubmits the message as a new unit of work. Every terminal path emits
//! exactly one health-status event.

use crate::bus::{Component, Health, OutboundSms, StatusEvent, TransportBus};
use crate::fields::{split_fields, OUTBOUND_FIELDS};
use crate::vendor::{classify_reply, send_fail_type, Credentials, SendOutcome, SendSms, SendStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle one outbound send request end to end.
pub async fn handle_outbound(
    message: &OutboundSms,
    creds: &Credentials,
    sender: &dyn SendSms,
    bus: &dyn TransportBus,
) {
    let (_, missing) = split_fields(&message.field_map(), OUTBOUND_FIELDS);
    if !missing.is_empty() {
        log::error!(
            "outbound message {} missing fields: {}",
            message.message_id,
            missing.join(", ")
        );
        if let Err(e) = bus.reject_outbound(message, &missing).await {
            log::warn!("outbound reject failed: {}", e);
        }
        return;
    }

    match sender.send_sms(&send_params(creds, message)).await {
        SendOutcome::TimedOut => send_timeout(message, bus).await,
        SendOutcome::Reply { status, body } => {
            let classified = classify_reply(&body);
            // Success needs both halves of the mixed-format reply: a 200 and
            // a body that is not an ERR report.
            if status == 200 && classified.code.is_none() {
                send_success(message, bus).await;
            } else {
                send_fail(message, &classified, bus).await;
            }
        }
    }
}

impl OutboundSms {
    /// Field map fed to the shared validator; unset options stay absent.
    fn field_map(&self) -> HashMap<String, String> {
        let mut values = HashMap::new();
        let mut put = |name: &str, value: &Option<String>| {
            if let Some(v) = value {
                values.insert(name.to_string(), v.clone());
            }
        };
        put("from_addr", &self.from_addr);
        put("to_addr", &self.to_addr);
        put("content", &self.content);
        values
    }
}

/// Query parameters for the vendor send call.
fn send_params(creds: &Credentials, message: &OutboundSms) -> Vec<(String, String)> {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let mut params = vec![
        ("username".to_string(), creds.username.clone()),
        ("password".to_string(), creds.password.clone()),
        ("sender".to_string(), field(&message.from_addr)),
        ("receiver".to_string(), field(&message.to_addr)),
        ("message".to_string(), field(&message.content)),
    ];
    // From the vendor docs: if the MO message id is validated, the MT is not
    // charged. Only one free MT is allowed for each MO, so the id is attached
    // only when the bus carried one.
    if let Some(id) = message.vendor_msgid() {
        params.push(("message_id".to_string(), id.to_string()));
    }
    params
}

async fn send_timeout(message: &OutboundSms, bus: &dyn TransportBus) {
    publish_nack(message, "Request timeout", bus).await;
    emit_status(
        bus,
        StatusEvent::new(
            Component::Outbound,
            Health::Down,
            "request_timeout",
            "Request timeout",
        ),
    )
    .await;
}

async fn send_success(message: &OutboundSms, bus: &dyn TransportBus) {
    if let Err(e) = bus
        .publish_ack(&message.message_id, &message.message_id)
        .await
    {
        log::warn!("outbound ack failed: {}", e);
    }
    emit_status(
        bus,
        StatusEvent::new(
            Component::Outbound,
            Health::Ok,
            "request_success",
            "Request successful",
        ),
    )
    .await;
}

async fn send_fail(message: &OutboundSms, status: &SendStatus, bus: &dyn TransportBus) {
    publish_nack(message, &status.message, bus).await;
    emit_status(
        bus,
        StatusEvent::new(
            Component::Outbound,
            Health::Down,
            send_fail_type(status.code.as_deref()),
            status.message.clone(),
        ),
    )
    .await;
}

async fn publish_nack(message: &OutboundSms, reason: &str, bus: &dyn TransportBus) {
    if let Err(e) = bus
        .publish_nack(&message.message_id, &message.message_id, reason)
        .await
    {
        log::warn!("outbound nack failed: {}", e);
    }
}

async fn emit_status(bus: &dyn TransportBus, event: StatusEvent) {
    if let Err(e) = bus.add_status(event).await {
        log::warn!("outbound status emission failed: {}", e);
    }
}

/// Drain outbound send requests until the channel closes (shutdown). Each
/// message is an independent unit of work with its own terminal outcome.
pub async fn run_outbound_worker(
    mut rx: mpsc::Receiver<OutboundSms>,
    creds: Credentials,
    sender: Arc<dyn SendSms>,
    bus: Arc<dyn TransportBus>,
) {
    while let Some(message) = rx.recv().await {
        handle_outbound(&message, &creds, sender.as_ref(), bus.as_ref()).await;
    }
    log::info!("outbound worker stopped");
}
