//! AS2 message model.
//!
//! - [`info`]: header metadata shared by every message
//! - [`mdn_request`]: the sender's receipt request
//! - [`mdn`]: disposition notifications and their signal mapping
//! - [`metadata`]: MDN data carried inside signals
//! - [`signal`]: message units (user message, receipt, error)

pub mod info;
pub mod mdn;
pub mod mdn_request;
pub mod metadata;
pub mod signal;

pub use info::{generate_message_id, header, GenericMessageInfo};
pub use mdn::{Disposition, DispositionModifier, DispositionType, MdnInfo};
pub use mdn_request::{MdnRequestOptions, SignatureRequest};
pub use metadata::MdnMetadata;
pub use signal::{ErrorEntry, ErrorKind, ErrorSignal, MessageUnit, Receipt, Severity, UserMessage};
