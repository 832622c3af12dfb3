//! MIME envelope model.
//!
//! An AS2 body is a single MIME entity, optionally wrapped in a
//! `multipart/signed` layer and/or an `application/pkcs7-mime` layer
//! (enveloped or compressed data):
//!
//! ```text
//! pkcs7-mime (enveloped)
//!   └─ pkcs7-mime (compressed)        optional
//!        └─ multipart/signed          optional
//!             ├─ business document    <- main part
//!             └─ pkcs7-signature
//! ```
//!
//! [`MimeEnvelope`] tracks the current layer as the pipeline peels or adds
//! wrappers.

pub mod content_type;
pub mod envelope;
pub mod headers;
pub mod multipart;
pub mod part;

pub use content_type::{types, ContentType};
pub use envelope::MimeEnvelope;
pub use headers::Headers;
pub use part::MimePart;
