//! # AS2 Core - Applicability Statement 2 messaging
//!
//! Message transformation pipeline and MDN state machine for AS2
//! (RFC 4130): S/MIME signing, encryption and compression of business
//! documents sent over HTTP, and the Message Disposition Notifications
//! (MDNs) that acknowledge them.
//!
//! ## Features
//!
//! - **S/MIME security**: CMS detached signatures, EnvelopedData and
//!   AuthEnvelopedData, CompressedData (RFC 3274)
//! - **MDN model**: parse and render `multipart/report` receipts, map them
//!   to receipt and error signals
//! - **MIC**: Received-Content-MIC computation and comparison
//! - **P-Modes**: processing-mode matching by party and agreement
//! - **HTTP surface**: axum receiving endpoint and reqwest sender
//!
//! ## Message Flow
//!
//! ```text
//! Sender                                                     Receiver
//!   |                                                           |
//!   |  prepare_send: sign → compress → encrypt                  |
//!   |------------------- POST (AS2 headers) ------------------->|
//!   |                   receive: decrypt → decompress → verify  |
//!   |                            → classify → create response   |
//!   |<------------- 200 + signed MDN (synchronous) -------------|
//!   |  complete_send: compare MIC → DELIVERED                   |
//! ```
//!
//! Asynchronous MDNs travel in a separate POST to the
//! `Receipt-Delivery-Option` URL and are matched by
//! `Original-Message-ID`.
//!
//! ### Processing States
//!
//! ```text
//! send:    READY_TO_SEND → SENDING → AWAITING_RECEIPT → DELIVERED
//!                            │   │                  └→ FAILURE
//!                            │   └→ DONE (no receipt requested)
//!                            └→ FAILURE | SUSPENDED
//! receive: RECEIVED → DELIVERED | DONE (signals) | FAILURE
//! reply:   READY_TO_PUSH (async MDN) → DONE
//! ```
//!
//! ### Envelope Layers
//!
//! | Content-Type                                  | Layer               |
//! |-----------------------------------------------|---------------------|
//! | `application/pkcs7-mime; smime-type=enveloped-data`  | encryption   |
//! | `application/pkcs7-mime; smime-type=compressed-data` | compression  |
//! | `multipart/signed; protocol=application/pkcs7-signature` | signature |
//! | `multipart/report; report-type=disposition-notification` | MDN      |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use as2::{Config, message::{GenericMessageInfo, UserMessage}};
//!
//! let config = Config::from_file("as2.toml")?;
//! let pipeline = config.pipeline()?;
//!
//! // Receiving side: feed the HTTP request, return the response
//! let outcome = pipeline.receive(request);
//! let response = outcome.response;
//!
//! // Sending side
//! let outbound = pipeline.prepare_send(&message)?;
//! let outcome = sender.send(&outbound).await;
//! let state = pipeline.complete_send(&outbound.message_id, outcome)?;
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: algorithm registry, CMS operations, MIC, certificates
//! - [`mime`]: headers, content types, parts and envelopes
//! - [`message`]: header metadata, MDN requests, MDNs and signals
//! - [`pmode`]: processing modes and the matcher
//! - [`pipeline`]: inbound and outbound runners and processing state
//! - [`services`]: message store, event sink and the service bundle
//! - [`server`]: axum HTTP endpoint
//! - [`transport`]: HTTP sender
//! - [`config`]: TOML and environment configuration

pub mod config;
pub mod crypto;
pub mod error;
pub mod message;
pub mod mime;
pub mod pipeline;
pub mod pmode;
pub mod server;
pub mod services;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use error::{As2Error, ErrorClass, Result};
pub use message::{GenericMessageInfo, MdnInfo, MdnRequestOptions, MessageUnit, UserMessage};
pub use mime::{MimeEnvelope, MimePart};
pub use pipeline::{As2Response, InboundOutcome, InboundRequest, OutboundMessage, Pipeline, ProcessingState};
pub use pmode::{PMode, PModeSet};
pub use server::{AppState, ServerConfig};
pub use services::Services;
pub use transport::HttpSender;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// AS2 protocol version written in `AS2-Version`
pub const AS2_VERSION: &str = "1.2";
