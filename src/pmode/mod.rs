//! Processing modes (P-Modes).
//!
//! A P-Mode describes one exchange relationship: who initiates, who
//! responds, how each side secures its messages and how receipts are
//! returned. The pipeline only reads P-Modes; they are loaded from
//! configuration at startup.
//!
//! ```toml
//! [[pmodes]]
//! id = "sender-to-receiver"
//! address = "https://receiver.example.com/as2"
//!
//! [pmodes.initiator]
//! party_ids = ["SenderX"]
//! security = { key_pair_alias = "sender", certificate_alias = "sender", signing = { algorithm = "SHA256withRSA" } }
//!
//! [pmodes.responder]
//! party_ids = ["ReceiverY"]
//! security = { certificate_alias = "receiver", encryption = { algorithm = "AES128_GCM" } }
//!
//! [pmodes.reporting]
//! receipt = "sync"
//! signed_receipt = true
//! mic_algorithms = ["sha-256"]
//! ```

pub mod matcher;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::{KeyReference, MicAlgorithmStyle};
use crate::error::{As2Error, Result};
use crate::message::MdnRequestOptions;

pub use matcher::{find_by_reference, find_for_message, resolve};

/// Messaging binding of a P-Mode; only AS2 P-Modes are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MepBinding {
    /// AS2 push
    #[default]
    As2,
    /// Any other protocol
    Other,
}

/// Signing settings of one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Signature algorithm name (e.g. `SHA256withRSA`). When absent the
    /// MDN request preference or the certificate's own algorithm applies.
    #[serde(default)]
    pub algorithm: Option<String>,
    /// Embed the signer certificate in the signature
    #[serde(default = "default_true")]
    pub include_certificate: bool,
    /// `micalg` naming style
    #[serde(default)]
    pub mic_style: Option<MicAlgorithmStyle>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: None,
            include_certificate: true,
            mic_style: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Encryption settings, applied when sending to the party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Content encryption algorithm name; AES128_GCM when absent
    #[serde(default)]
    pub algorithm: Option<String>,
    /// How the recipient certificate is referenced
    #[serde(default)]
    pub key_reference: KeyReference,
}

/// Security settings of one party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Private key alias (local party only)
    #[serde(default)]
    pub key_pair_alias: Option<String>,
    /// Password protecting the key pair
    #[serde(default)]
    pub key_pair_password: Option<String>,
    /// Certificate of this party
    #[serde(default)]
    pub certificate_alias: Option<String>,
    /// Sign messages sent by this party
    #[serde(default)]
    pub signing: Option<SigningConfig>,
    /// Encrypt messages sent to this party
    #[serde(default)]
    pub encryption: Option<EncryptionConfig>,
    /// Compress messages sent by this party
    #[serde(default)]
    pub compress: bool,
}

/// One side of the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PModeParty {
    /// Accepted AS2 names; empty matches any
    #[serde(default)]
    pub party_ids: Vec<String>,
    /// Security settings
    #[serde(default)]
    pub security: SecurityConfig,
}

/// How receipts are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyPattern {
    /// No receipt requested
    #[default]
    None,
    /// In the HTTP response
    Sync,
    /// Posted to a callback URL
    Callback,
}

/// Receipt settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Receipt pattern
    #[serde(default)]
    pub receipt: ReplyPattern,
    /// URL for asynchronous receipts
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Request a signed receipt
    #[serde(default)]
    pub signed_receipt: bool,
    /// Requested MIC algorithms, most preferred first
    #[serde(default)]
    pub mic_algorithms: Vec<String>,
    /// `Disposition-Notification-To` value
    #[serde(default)]
    pub notification_to: Option<String>,
}

/// A processing mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PMode {
    /// Unique identifier
    pub id: String,
    /// Messaging binding
    #[serde(default)]
    pub binding: MepBinding,
    /// Sender of user messages
    #[serde(default)]
    pub initiator: PModeParty,
    /// Receiver of user messages
    #[serde(default)]
    pub responder: PModeParty,
    /// Receipt settings
    #[serde(default)]
    pub reporting: ReportingConfig,
    /// Responder URL
    #[serde(default)]
    pub address: Option<String>,
}

impl PMode {
    /// Empty AS2 P-Mode.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            binding: MepBinding::As2,
            initiator: PModeParty::default(),
            responder: PModeParty::default(),
            reporting: ReportingConfig::default(),
            address: None,
        }
    }

    /// Whether the P-Mode is bound to AS2.
    pub fn is_as2(&self) -> bool {
        self.binding == MepBinding::As2
    }

    /// MDN request to attach to user messages sent under this P-Mode.
    pub fn mdn_request(&self) -> Option<MdnRequestOptions> {
        let to = self
            .reporting
            .notification_to
            .clone()
            .or_else(|| self.initiator.party_ids.first().cloned())
            .unwrap_or_else(|| "as2".to_string());
        let mut request = match self.reporting.receipt {
            ReplyPattern::None => return None,
            ReplyPattern::Sync => MdnRequestOptions::sync(to),
            ReplyPattern::Callback => {
                let url = self.reporting.callback_url.clone()?;
                MdnRequestOptions::sync(to).with_reply_to(url)
            },
        };
        if self.reporting.signed_receipt {
            request = request.signed(false, self.reporting.mic_algorithms.clone());
        }
        Some(request)
    }
}

/// Read access to configured P-Modes.
pub trait PModeStore: Send + Sync {
    /// P-Mode by id.
    fn get(&self, id: &str) -> Option<&PMode>;

    /// All P-Modes.
    fn iter(&self) -> Box<dyn Iterator<Item = &PMode> + '_>;
}

/// Immutable set of P-Modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PModeSet {
    #[serde(default)]
    pmodes: Vec<PMode>,
}

impl PModeSet {
    /// Build a set, rejecting duplicate or empty ids.
    pub fn new(pmodes: Vec<PMode>) -> Result<Self> {
        let mut seen = HashSet::new();
        for pmode in &pmodes {
            if pmode.id.trim().is_empty() {
                return Err(As2Error::Config("P-Mode with empty id".into()));
            }
            if !seen.insert(pmode.id.as_str()) {
                return Err(As2Error::Config(format!("duplicate P-Mode id '{}'", pmode.id)));
            }
            if pmode.reporting.receipt == ReplyPattern::Callback && pmode.reporting.callback_url.is_none() {
                tracing::warn!(pmode = %pmode.id, "callback receipts configured without callback_url");
            }
        }
        Ok(Self { pmodes })
    }

    /// Parse `[[pmodes]]` tables.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let set: PModeSet = toml::from_str(toml)?;
        Self::new(set.pmodes)
    }

    /// Load `[[pmodes]]` tables from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| As2Error::Config(format!("Failed to read P-Mode file {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Number of P-Modes.
    pub fn len(&self) -> usize {
        self.pmodes.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.pmodes.is_empty()
    }
}

impl PModeStore for PModeSet {
    fn get(&self, id: &str) -> Option<&PMode> {
        self.pmodes.iter().find(|p| p.id == id)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &PMode> + '_> {
        Box::new(self.pmodes.iter())
    }
}
