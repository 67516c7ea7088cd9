//! Bus-facing message and event types, and the publish seam.
//!
//! The transport does not speak to a broker directly: everything it emits
//! goes through the `TransportBus` trait so the binary can run standalone
//! (log sink) and deployments can wire in a real broker client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata key the vendor block lives under in `transport_metadata`.
pub const TRANSPORT_NAME: &str = "vas2nets_sms";

/// Transport type tag on published inbound messages.
pub const TRANSPORT_TYPE: &str = "sms";

/// Inbound SMS published to the bus once a delivery notification is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundSms {
    pub message_id: String,
    pub from_addr: String,
    /// Always "msisdn": the vendor identifies senders by phone number.
    pub from_addr_type: String,
    pub to_addr: String,
    pub content: String,
    /// Carrier identifier as reported by the vendor (`operator` field).
    pub provider: String,
    pub transport_type: String,
    pub transport_metadata: TransportMetadata,
}

/// Outbound send request consumed from the bus. Address and content fields
/// are optional on the wire; the adapter validates before sending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundSms {
    pub message_id: String,
    #[serde(default)]
    pub from_addr: Option<String>,
    #[serde(default)]
    pub to_addr: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_metadata: Option<TransportMetadata>,
}

/// Transport metadata envelope: vendor-specific block keyed by transport name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vas2nets_sms: Option<VendorMetadata>,
}

/// Vendor block: the msgid the vendor assigned to a delivered MO message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgid: Option<String>,
}

impl OutboundSms {
    /// Vendor message id of the MO this reply answers, when the bus carried
    /// one. Each missing level yields None; no sentinel values.
    pub fn vendor_msgid(&self) -> Option<&str> {
        self.transport_metadata
            .as_ref()?
            .vas2nets_sms
            .as_ref()?
            .msgid
            .as_deref()
    }
}

impl TransportMetadata {
    /// Metadata carrying a vendor msgid (used when republishing an MO's id).
    pub fn with_msgid(msgid: impl Into<String>) -> Self {
        Self {
            vas2nets_sms: Some(VendorMetadata {
                msgid: Some(msgid.into()),
            }),
        }
    }
}

/// Pipeline a health-status event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Inbound,
    Outbound,
}

/// Health of a pipeline after a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Down,
}

/// Health-status event. Exactly one is emitted per terminal outcome of
/// either pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub component: Component,
    pub status: Health,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        component: Component,
        status: Health,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component,
            status,
            event_type: event_type.into(),
            message: message.into(),
            details: None,
            at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus publish failed: {0}")]
    Publish(String),
}

/// Publish seam toward the message bus. Implementations own delivery;
/// the adapters own what gets emitted and in which order.
#[async_trait]
pub trait TransportBus: Send + Sync {
    /// Publish an accepted inbound SMS.
    async fn publish_inbound(&self, message: InboundSms) -> Result<(), BusError>;

    /// Acknowledge a completed outbound send.
    async fn publish_ack(
        &self,
        user_message_id: &str,
        sent_message_id: &str,
    ) -> Result<(), BusError>;

    /// Negatively acknowledge a failed outbound send.
    async fn publish_nack(
        &self,
        user_message_id: &str,
        sent_message_id: &str,
        reason: &str,
    ) -> Result<(), BusError>;

    /// Return an outbound message to the bus without attempting a send.
    async fn reject_outbound(
        &self,
        message: &OutboundSms,
        reasons: &[String],
    ) -> Result<(), BusError>;

    /// Emit a health-status event.
    async fn add_status(&self, event: StatusEvent) -> Result<(), BusError>;
}

/// Publisher that logs every bus event. Wired in when the transport runs
/// standalone (CLI) without a broker connection.
pub struct LogBus;

#[async_trait]
impl TransportBus for LogBus {
    async fn publish_inbound(&self, message: InboundSms) -> Result<(), BusError> {
        log::info!(
            "bus inbound: {}",
            serde_json::to_string(&message).unwrap_or_default()
        );
        Ok(())
    }

    async fn publish_ack(
        &self,
        user_message_id: &str,
        sent_message_id: &str,
    ) -> Result<(), BusError> {
        log::info!("bus ack: user={} sent={}", user_message_id, sent_message_id);
        Ok(())
    }

    async fn publish_nack(
        &self,
        user_message_id: &str,
        sent_message_id: &str,
        reason: &str,
    ) -> Result<(), BusError> {
        log::info!(
            "bus nack: user={} sent={} reason={}",
            user_message_id,
            sent_message_id,
            reason
        );
        Ok(())
    }

    async fn reject_outbound(
        &self,
        message: &OutboundSms,
        reasons: &[String],
    ) -> Result<(), BusError> {
        log::info!(
            "bus reject: message_id={} missing={}",
            message.message_id,
            reasons.join(", ")
        );
        Ok(())
    }

    async fn add_status(&self, event: StatusEvent) -> Result<(), BusError> {
        log::info!(
            "bus status: {}",
            serde_json::to_string(&event).unwrap_or_default()
        );
        Ok(())
    }
}
