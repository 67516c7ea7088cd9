//! Vas2Nets SMS transport core — configuration, field validation, vendor
//! reply classification, and the inbound/outbound bus adapters used by the
//! `vas2nets-sms` binary.

pub mod bus;
pub mod config;
pub mod fields;
pub mod inbound;
pub mod outbound;
pub mod server;
pub mod vendor;
