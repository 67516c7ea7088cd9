//! Vas2Nets reply classification and the outbound HTTP client.
//!
//! The vendor mixes its error reporting into the response body: a failure is
//! a body of the form `ERR-<digits> <free text>` (the HTTP status may still
//! be 200), anything else means the send was accepted.

use async_trait::async_trait;
use std::time::Duration;

/// Classified vendor reply. `code: None` means the body is not an error
/// report and the call succeeded at the vendor level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendStatus {
    pub code: Option<String>,
    pub message: String,
}

/// Classify a vendor reply body. Never fails: a body that does not match the
/// error shape is returned whole as the success message.
pub fn classify_reply(body: &str) -> SendStatus {
    match parse_error_line(body) {
        Some((code, message)) => SendStatus {
            code: Some(code),
            message,
        },
        None => SendStatus {
            code: None,
            message: body.to_string(),
        },
    }
}

/// Parse `ERR-<digits> <free text>` at the start of the body.
fn parse_error_line(body: &str) -> Option<(String, String)> {
    let rest = body.strip_prefix("ERR-")?;
    let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let (number, tail) = rest.split_at(digits);
    let message = tail.strip_prefix(' ')?;
    // The error report is a single line. A trailing newline is tolerated,
    // but an embedded one means the body is not an error report.
    let message = message.strip_suffix('\n').unwrap_or(message);
    if message.contains('\n') {
        return None;
    }
    Some((format!("ERR-{}", number), message.to_string()))
}

/// Map a vendor error code to a stable failure tag for health-status events.
/// Unknown codes (and None) fall back to `request_fail_unknown`; this is a
/// total function.
pub fn send_fail_type(code: Option<&str>) -> &'static str {
    match code {
        Some("ERR-11") => "missing_username",
        Some("ERR-12") => "missing_password",
        Some("ERR-13") => "missing_destination",
        Some("ERR-14") => "missing_sender_id",
        Some("ERR-15") => "missing_message",
        Some("ERR-21") => "sender_id_too_long",
        Some("ERR-33") => "invalid_login",
        Some("ERR-41") => "insufficient_credit",
        Some("ERR-51") => "invalid_message_id",
        Some("ERR-52") => "system_error",
        Some("ERR-70") => "invalid_destination_number",
        _ => "request_fail_unknown",
    }
}

/// Vendor account credentials sent with every outbound request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Outcome of one send attempt. Cancellation, a torn-down connection, and a
/// response that never arrives are one variant: the adapter treats them all
/// as the timeout path and never retries.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// A response arrived and its body was fully read.
    Reply { status: u16, body: String },
    /// No usable response before the deadline (or connection failure).
    TimedOut,
}

/// Sender seam for the outbound adapter; stubbed in tests.
#[async_trait]
pub trait SendSms: Send + Sync {
    async fn send_sms(&self, params: &[(String, String)]) -> SendOutcome;
}

/// reqwest-backed sender for the configured vendor endpoint.
pub struct VendorClient {
    url: String,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

impl VendorClient {
    /// `timeout_secs: None` means wait indefinitely for the vendor.
    pub fn new(url: String, timeout_secs: Option<u64>) -> Self {
        Self {
            url,
            timeout: timeout_secs.map(Duration::from_secs),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SendSms for VendorClient {
    /// One GET against the vendor endpoint. Transport-level failures of any
    /// kind collapse into `TimedOut`; they share one terminal action.
    async fn send_sms(&self, params: &[(String, String)]) -> SendOutcome {
        let mut req = self.client.get(&self.url).query(params);
        if let Some(t) = self.timeout {
            req = req.timeout(t);
        }
        let res = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("vendor request failed: {}", e);
                return SendOutcome::TimedOut;
            }
        };
        let status = res.status().as_u16();
        let body = match res.text().await {
            Ok(b) => b,
            Err(e) => {
                log::warn!("vendor response body never completed: {}", e);
                return SendOutcome::TimedOut;
            }
        };
        SendOutcome::Reply { status, body }
    }
}
