//! Outbound HTTP delivery.
//!
//! The pipeline produces [`OutboundMessage`](crate::pipeline::OutboundMessage)
//! values and consumes [`SendOutcome`](crate::pipeline::SendOutcome)
//! values; this module moves bytes between the two.
//!
//! ```text
//! Pipeline::prepare_send ──> HttpSender::send ──> Pipeline::complete_send
//!                              │         ▲
//!                              ▼         │
//!                            POST ──> partner AS2 endpoint
//! ```
//!
//! Asynchronous MDNs collected by the server take the same path with the
//! `Receipt-Delivery-Option` URL as target. Their delivery is repeated
//! with [`ExponentialBackoff`] while the partner is unreachable.

mod http;
mod retry;

pub use self::http::HttpSender;
pub use self::retry::ExponentialBackoff;
