//! Folio Server
//!
//! Outbound webhook delivery for the portfolio backend: endpoint
//! registration, signed fan-out, retries and delivery history.

pub mod api;
pub mod config;
pub mod webhooks;
