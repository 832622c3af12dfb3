//! Per-message processing state.
//!
//! ```text
//! receive:  Received ──► Delivered ───────────────► (receipt sent)
//!              └───────► Failure ──► Done            not reportable
//!                                 ├► ReadyToPush     async MDN queued
//!                                 └► (sync MDN attached to the response)
//!
//! send:     ReadyToSend ──► Sending ──► Done            no receipt expected
//!                              │     ├► AwaitingReceipt ──► Delivered | Failure
//!                              │     └► Delivered | Failure (sync MDN)
//!                              └────► Failure | Suspended
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat processing state of one message unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingState {
    /// Received, being processed
    Received,
    /// Queued for sending
    ReadyToSend,
    /// Being sent
    Sending,
    /// Signal waiting for asynchronous delivery
    ReadyToPush,
    /// Sent, receipt outstanding
    AwaitingReceipt,
    /// Delivered to the business application or acknowledged by the peer
    Delivered,
    /// Finished; nothing more to do
    Done,
    /// Processing failed
    Failure,
    /// Held until configuration is fixed
    Suspended,
}

impl ProcessingState {
    /// Wire / log spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingState::Received => "RECEIVED",
            ProcessingState::ReadyToSend => "READY_TO_SEND",
            ProcessingState::Sending => "SENDING",
            ProcessingState::ReadyToPush => "READY_TO_PUSH",
            ProcessingState::AwaitingReceipt => "AWAITING_RECEIPT",
            ProcessingState::Delivered => "DELIVERED",
            ProcessingState::Done => "DONE",
            ProcessingState::Failure => "FAILURE",
            ProcessingState::Suspended => "SUSPENDED",
        }
    }

    /// No further transition is driven by this crate.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            ProcessingState::Delivered | ProcessingState::Done | ProcessingState::Suspended
        )
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serde_spelling() {
        let json = serde_json::to_string(&ProcessingState::ReadyToPush).unwrap();
        assert_eq!(json, "\"READY_TO_PUSH\"");
        assert_eq!(ProcessingState::ReadyToPush.to_string(), "READY_TO_PUSH");
        assert!(ProcessingState::Done.is_final());
        assert!(!ProcessingState::Failure.is_final());
    }
}
