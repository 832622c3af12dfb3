//! Collaborator services used by the pipeline.
//!
//! The pipeline never reaches for global state. Each run receives a
//! [`Services`] bundle holding the certificate manager, the P-Mode store,
//! the message store and the event sink. In-memory implementations are
//! provided for standalone use and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use crate::crypto::{CertificateManager, DigestAlgorithm, EncryptionAlgorithm, Mic};
use crate::error::{As2Error, Result};
use crate::message::MessageUnit;
use crate::pipeline::ProcessingState;
use crate::pmode::PModeStore;

// ============================================================================
// Message store
// ============================================================================

/// A persisted message unit.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// The unit
    pub unit: MessageUnit,
    /// Current state
    pub state: ProcessingState,
    /// MIC the peer should return (outgoing user messages)
    pub expected_mic: Option<Mic>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

/// Message unit persistence.
pub trait MessageStore: Send + Sync {
    /// Record a received unit.
    fn store_incoming(&self, unit: &MessageUnit, state: ProcessingState) -> Result<()>;

    /// Record a unit about to be sent.
    fn store_outgoing(&self, unit: &MessageUnit, state: ProcessingState) -> Result<()>;

    /// Update the state of a stored unit (incoming or outgoing).
    fn set_processing_state(&self, message_id: &str, state: ProcessingState) -> Result<()>;

    /// Remember the MIC expected back for an outgoing message.
    fn set_expected_mic(&self, message_id: &str, mic: Mic) -> Result<()>;

    /// Outgoing unit by Message-ID.
    fn find_outgoing(&self, message_id: &str) -> Option<StoredMessage>;

    /// Incoming unit by Message-ID.
    fn find_incoming(&self, message_id: &str) -> Option<StoredMessage>;
}

#[derive(Debug, Default)]
struct Tables {
    incoming: HashMap<String, StoredMessage>,
    outgoing: HashMap<String, StoredMessage>,
}

/// Message store kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    tables: RwLock<Tables>,
}

impl InMemoryMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| As2Error::Server("message store lock poisoned".into()))
    }

    fn stored(unit: &MessageUnit, state: ProcessingState) -> StoredMessage {
        StoredMessage {
            unit: unit.clone(),
            state,
            expected_mic: None,
            updated_at: Utc::now(),
        }
    }

    /// Every stored unit in `state`, incoming and outgoing.
    pub fn in_state(&self, state: ProcessingState) -> Vec<StoredMessage> {
        self.tables
            .read()
            .map(|t| {
                t.incoming
                    .values()
                    .chain(t.outgoing.values())
                    .filter(|m| m.state == state)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn store_incoming(&self, unit: &MessageUnit, state: ProcessingState) -> Result<()> {
        self.write()?
            .incoming
            .insert(unit.message_id().to_string(), Self::stored(unit, state));
        Ok(())
    }

    fn store_outgoing(&self, unit: &MessageUnit, state: ProcessingState) -> Result<()> {
        let mut tables = self.write()?;
        let expected_mic = tables
            .outgoing
            .get(unit.message_id())
            .and_then(|m| m.expected_mic.clone());
        let mut stored = Self::stored(unit, state);
        stored.expected_mic = expected_mic;
        tables.outgoing.insert(unit.message_id().to_string(), stored);
        Ok(())
    }

    fn set_processing_state(&self, message_id: &str, state: ProcessingState) -> Result<()> {
        let mut tables = self.write()?;
        let Tables { incoming, outgoing } = &mut *tables;
        let stored = outgoing
            .get_mut(message_id)
            .or_else(|| incoming.get_mut(message_id))
            .ok_or_else(|| As2Error::Validation(format!("unknown message {message_id}")))?;
        tracing::debug!(message_id, from = %stored.state, to = %state, "processing state change");
        stored.state = state;
        stored.updated_at = Utc::now();
        Ok(())
    }

    fn set_expected_mic(&self, message_id: &str, mic: Mic) -> Result<()> {
        let mut tables = self.write()?;
        let stored = tables
            .outgoing
            .get_mut(message_id)
            .ok_or_else(|| As2Error::Validation(format!("unknown outgoing message {message_id}")))?;
        stored.expected_mic = Some(mic);
        Ok(())
    }

    fn find_outgoing(&self, message_id: &str) -> Option<StoredMessage> {
        self.tables.read().ok()?.outgoing.get(message_id).cloned()
    }

    fn find_incoming(&self, message_id: &str) -> Option<StoredMessage> {
        self.tables.read().ok()?.incoming.get(message_id).cloned()
    }
}

// ============================================================================
// Events
// ============================================================================

/// Security events raised while processing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum As2Event {
    /// Signature verified
    SignatureVerified {
        /// Message
        message_id: String,
        /// Digest used by the signer
        digest: DigestAlgorithm,
    },
    /// Signature verified but the signer is trusted with warnings
    SignatureTrustWarning {
        /// Message
        message_id: String,
        /// Trust warnings
        warnings: Vec<String>,
    },
    /// Signature verification failed
    SignatureVerificationFailed {
        /// Message
        message_id: String,
        /// Reason
        reason: String,
    },
    /// Message decrypted
    Decrypted {
        /// Message
        message_id: String,
        /// Content encryption algorithm
        algorithm: EncryptionAlgorithm,
    },
    /// Decryption failed
    DecryptionFailed {
        /// Message
        message_id: String,
        /// Reason
        reason: String,
    },
    /// Outgoing message signed
    Signed {
        /// Message
        message_id: String,
        /// Signature algorithm name
        algorithm: String,
    },
    /// Signing failed
    SigningFailed {
        /// Message
        message_id: String,
        /// Reason
        reason: String,
    },
    /// Outgoing message encrypted
    Encrypted {
        /// Message
        message_id: String,
        /// Content encryption algorithm
        algorithm: EncryptionAlgorithm,
    },
    /// Encryption failed
    EncryptionFailed {
        /// Message
        message_id: String,
        /// Reason
        reason: String,
    },
    /// Received MIC differs from the one computed when sending
    MicMismatch {
        /// Acknowledged message
        message_id: String,
        /// MIC computed when sending
        expected: String,
        /// MIC reported by the peer
        received: String,
    },
}

impl As2Event {
    /// Message the event concerns.
    pub fn message_id(&self) -> &str {
        match self {
            As2Event::SignatureVerified { message_id, .. }
            | As2Event::SignatureTrustWarning { message_id, .. }
            | As2Event::SignatureVerificationFailed { message_id, .. }
            | As2Event::Decrypted { message_id, .. }
            | As2Event::DecryptionFailed { message_id, .. }
            | As2Event::Signed { message_id, .. }
            | As2Event::SigningFailed { message_id, .. }
            | As2Event::Encrypted { message_id, .. }
            | As2Event::EncryptionFailed { message_id, .. }
            | As2Event::MicMismatch { message_id, .. } => message_id,
        }
    }

    /// Whether the event reports a failure or warning.
    pub fn is_problem(&self) -> bool {
        !matches!(
            self,
            As2Event::SignatureVerified { .. }
                | As2Event::Decrypted { .. }
                | As2Event::Signed { .. }
                | As2Event::Encrypted { .. }
        )
    }
}

/// Fire-and-forget event receiver.
pub trait EventSink: Send + Sync {
    /// Deliver an event. Must not fail or block for long.
    fn raise(&self, event: As2Event);
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn raise(&self, event: As2Event) {
        if event.is_problem() {
            tracing::warn!(message_id = %event.message_id(), ?event, "as2 event");
        } else {
            tracing::info!(message_id = %event.message_id(), ?event, "as2 event");
        }
    }
}

/// Records events in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<As2Event>>,
}

impl CollectingEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<As2Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for CollectingEventSink {
    fn raise(&self, event: As2Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Services handed to every pipeline run.
#[derive(Clone)]
pub struct Services {
    /// Certificates, keys and trust
    pub certificates: Arc<dyn CertificateManager>,
    /// P-Mode configuration
    pub pmodes: Arc<dyn PModeStore>,
    /// Message persistence
    pub messages: Arc<dyn MessageStore>,
    /// Event receiver
    pub events: Arc<dyn EventSink>,
}

impl Services {
    /// Bundle with an in-memory message store and a tracing event sink.
    pub fn new(certificates: Arc<dyn CertificateManager>, pmodes: Arc<dyn PModeStore>) -> Self {
        Self {
            certificates,
            pmodes,
            messages: Arc::new(InMemoryMessageStore::new()),
            events: Arc::new(TracingEventSink),
        }
    }

    /// Replace the message store.
    pub fn with_messages(mut self, messages: Arc<dyn MessageStore>) -> Self {
        self.messages = messages;
        self
    }

    /// Replace the event sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
