//! Message pipelines.
//!
//! A [`Pipeline`] owns the injected [`Services`] and the local station
//! settings. Each message runs its stage list synchronously; distinct
//! messages may be processed in parallel on clones of the pipeline.
//!
//! ```text
//! receive:  ParseHeaders → ResolvePMode → Decrypt → Decompress(Envelope)
//!           → VerifySignature → Decompress(Content) → Classify
//!           → ConvertMdn → CreateResponse
//!
//! send:     Sign → Compress → Encrypt → headers + expected MIC
//! ```
//!
//! Receiving never returns an error: failures are recorded on the
//! message, reported in an MDN where one was requested, and reflected in
//! the HTTP status otherwise. Sending returns configuration and
//! cryptographic errors after recording the resulting state.

pub mod inbound;
pub mod outbound;
pub mod state;
pub mod wire;

use crate::config::LocalConfig;
use crate::services::Services;

pub use inbound::{DecompressTarget, InboundOutcome, InboundStage, INBOUND_STAGES};
pub use outbound::SendOutcome;
pub use state::ProcessingState;
pub use wire::{As2Response, InboundRequest, OutboundMessage};

/// Inbound and outbound AS2 processing over injected services.
#[derive(Debug, Clone)]
pub struct Pipeline {
    services: Services,
    local: LocalConfig,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(services: Services, local: LocalConfig) -> Self {
        Self { services, local }
    }

    /// Injected services.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Local station settings.
    pub fn local(&self) -> &LocalConfig {
        &self.local
    }
}
