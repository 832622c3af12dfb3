//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`AS2_*`)
//! - CLI arguments (for `as2 serve`)
//!
//! ```toml
//! [local]
//! reporting_ua = "as2-core"
//! mic_style = "rfc5751"
//!
//! [server]
//! port = 4080
//! path = "/as2"
//!
//! [[certificates]]
//! alias = "receiver"
//! certificate = "keys/receiver.crt"
//! private_key = "keys/receiver.key"
//!
//! [[pmodes]]
//! id = "sender-to-receiver"
//! ```
//!
//! Relative certificate paths are resolved against the directory of the
//! config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::{InMemoryCertificateManager, MicAlgorithmStyle};
use crate::error::{As2Error, Result};
use crate::pipeline::Pipeline;
use crate::pmode::{PMode, PModeSet};
use crate::services::Services;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local AS2 station settings
    #[serde(default)]
    pub local: LocalConfig,

    /// HTTP listener settings
    #[serde(default)]
    pub server: HttpConfig,

    /// Certificates and key pairs
    #[serde(default)]
    pub certificates: Vec<CertificateEntry>,

    /// Processing modes
    #[serde(default)]
    pub pmodes: Vec<PMode>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| As2Error::Config(format!("Failed to read config file: {e}")))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| As2Error::Config(format!("Failed to parse config: {e}")))?;

        if let Some(base) = path.parent() {
            for entry in &mut config.certificates {
                entry.resolve_paths(base);
            }
        }
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Listener settings
        if let Ok(host) = std::env::var("AS2_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("AS2_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("AS2_PATH") {
            config.server.path = path;
        }
        if let Ok(val) = std::env::var("AS2_MAX_BODY_SIZE") {
            if let Ok(val) = val.parse() {
                config.server.max_body_size = val;
            }
        }

        // Local station settings
        if let Ok(ua) = std::env::var("AS2_REPORTING_UA") {
            config.local.reporting_ua = ua;
        }
        if let Ok(style) = std::env::var("AS2_MIC_STYLE") {
            match style.to_ascii_lowercase().as_str() {
                "rfc3851" => config.local.mic_style = MicAlgorithmStyle::Rfc3851,
                "rfc5751" => config.local.mic_style = MicAlgorithmStyle::Rfc5751,
                other => tracing::warn!(value = other, "ignoring unknown AS2_MIC_STYLE"),
            }
        }
        if let Ok(domain) = std::env::var("AS2_MESSAGE_ID_DOMAIN") {
            config.local.message_id_domain = domain;
        }

        config
    }

    /// Merge with another config (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        let default_server = HttpConfig::default();
        let default_local = LocalConfig::default();

        let mut certificates = self.certificates;
        certificates.extend(other.certificates);
        let mut pmodes = self.pmodes;
        pmodes.extend(other.pmodes);

        Self {
            local: LocalConfig {
                reporting_ua: if other.local.reporting_ua != default_local.reporting_ua {
                    other.local.reporting_ua
                } else {
                    self.local.reporting_ua
                },
                mic_style: if other.local.mic_style != default_local.mic_style {
                    other.local.mic_style
                } else {
                    self.local.mic_style
                },
                message_id_domain: if other.local.message_id_domain != default_local.message_id_domain {
                    other.local.message_id_domain
                } else {
                    self.local.message_id_domain
                },
                ..self.local
            },
            server: HttpConfig {
                host: if other.server.host != default_server.host {
                    other.server.host
                } else {
                    self.server.host
                },
                port: if other.server.port != default_server.port {
                    other.server.port
                } else {
                    self.server.port
                },
                path: if other.server.path != default_server.path {
                    other.server.path
                } else {
                    self.server.path
                },
                max_body_size: if other.server.max_body_size != default_server.max_body_size {
                    other.server.max_body_size
                } else {
                    self.server.max_body_size
                },
                ..self.server
            },
            certificates,
            pmodes,
        }
    }

    /// Load every configured certificate into an in-memory store.
    pub fn certificate_manager(&self) -> Result<InMemoryCertificateManager> {
        let mut manager =
            InMemoryCertificateManager::new().with_trust_unknown(self.local.trust_unknown_certificates);
        for entry in &self.certificates {
            let certificate = read_pem(&entry.certificate)?;
            match &entry.private_key {
                Some(key_path) => {
                    let key = read_pem(key_path)?;
                    manager.add_key_pair_pem(&entry.alias, &certificate, &key, entry.password.clone())?;
                },
                None => manager.add_certificate_pem(&entry.alias, &certificate)?,
            }
            tracing::debug!(alias = %entry.alias, key = entry.private_key.is_some(), "loaded certificate");
        }
        Ok(manager)
    }

    /// Validated P-Mode set.
    pub fn pmode_set(&self) -> Result<PModeSet> {
        PModeSet::new(self.pmodes.clone())
    }

    /// Service bundle with in-memory stores built from this config.
    pub fn services(&self) -> Result<Services> {
        Ok(Services::new(
            Arc::new(self.certificate_manager()?),
            Arc::new(self.pmode_set()?),
        ))
    }

    /// Pipeline over [`Config::services`] and the local settings.
    pub fn pipeline(&self) -> Result<Pipeline> {
        Ok(Pipeline::new(self.services()?, self.local.clone()))
    }
}

fn read_pem(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| As2Error::Config(format!("Failed to read {}: {e}", path.display())))
}

/// Settings of the local AS2 station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// `Reporting-UA` written into MDNs
    #[serde(default = "default_reporting_ua")]
    pub reporting_ua: String,

    /// Default `micalg` / MIC naming style
    #[serde(default)]
    pub mic_style: MicAlgorithmStyle,

    /// `AS2-Version` header value
    #[serde(default = "default_as2_version")]
    pub as2_version: String,

    /// Right-hand side of generated Message-IDs
    #[serde(default = "default_message_id_domain")]
    pub message_id_domain: String,

    /// Accept signer certificates missing from the store, with a warning
    #[serde(default)]
    pub trust_unknown_certificates: bool,
}

fn default_reporting_ua() -> String {
    format!("as2-core/{}", crate::VERSION)
}

fn default_as2_version() -> String {
    crate::AS2_VERSION.to_string()
}

fn default_message_id_domain() -> String {
    "as2-core.local".to_string()
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            reporting_ua: default_reporting_ua(),
            mic_style: MicAlgorithmStyle::default(),
            as2_version: default_as2_version(),
            message_id_domain: default_message_id_domain(),
            trust_unknown_certificates: false,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path receiving AS2 messages
    pub path: String,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Timeout for outgoing requests in seconds
    pub timeout_secs: u64,

    /// Delivery attempts for asynchronous MDNs, the first one included
    pub max_attempts: u32,

    /// Delay before the first repeated delivery in milliseconds; doubles
    /// with every further attempt
    pub retry_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4080,
            path: "/as2".to_string(),
            max_body_size: 50 * 1024 * 1024, // 50 MB
            timeout_secs: 60,
            max_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl HttpConfig {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One certificate, optionally with its private key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateEntry {
    /// Alias referenced from P-Modes
    pub alias: String,

    /// PEM certificate file
    pub certificate: PathBuf,

    /// PKCS#8 PEM private key file
    #[serde(default)]
    pub private_key: Option<PathBuf>,

    /// Password P-Modes must present to use the key
    #[serde(default)]
    pub password: Option<String>,
}

impl CertificateEntry {
    fn resolve_paths(&mut self, base: &Path) {
        if self.certificate.is_relative() {
            self.certificate = base.join(&self.certificate);
        }
        if let Some(key) = &mut self.private_key {
            if key.is_relative() {
                *key = base.join(&*key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmode::PModeStore;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 4080);
        assert_eq!(config.server.path, "/as2");
        assert_eq!(config.local.as2_version, "1.2");
        assert!(config.local.reporting_ua.starts_with("as2-core/"));
        assert!(config.certificates.is_empty());
    }

    #[test]
    fn test_listen_addr() {
        let config = HttpConfig::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:4080");
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [local]
            reporting_ua = "test-ua"
            mic_style = "rfc5751"

            [server]
            host = "0.0.0.0"
            port = 9090

            [[pmodes]]
            id = "p1"

            [pmodes.initiator]
            party_ids = ["SenderX"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.local.reporting_ua, "test-ua");
        assert_eq!(config.local.mic_style, MicAlgorithmStyle::Rfc5751);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.path, "/as2");
        assert_eq!(config.pmodes[0].initiator.party_ids, vec!["SenderX"]);
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::copy(fixture("receiver.crt"), dir.path().join("receiver.crt")).unwrap();
        std::fs::copy(fixture("receiver.key"), dir.path().join("receiver.key")).unwrap();
        let path = dir.path().join("as2.toml");
        std::fs::write(
            &path,
            r#"
                [[certificates]]
                alias = "receiver"
                certificate = "receiver.crt"
                private_key = "receiver.key"
                password = "secret"

                [[pmodes]]
                id = "in"
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.certificates[0].certificate, dir.path().join("receiver.crt"));

        let services = config.services().unwrap();
        assert!(services.certificates.key_pair("receiver", Some("secret")).is_some());
        assert!(services.certificates.key_pair("receiver", None).is_none());
        assert!(services.pmodes.get("in").is_some());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/as2.toml").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_merge_prefers_non_default_values() {
        let mut base = Config::default();
        base.server.port = 5000;
        base.pmodes.push(PMode::new("a"));

        let mut over = Config::default();
        over.server.host = "0.0.0.0".into();
        over.pmodes.push(PMode::new("b"));

        let merged = base.merge(over);
        assert_eq!(merged.server.port, 5000);
        assert_eq!(merged.server.host, "0.0.0.0");
        assert_eq!(merged.pmodes.len(), 2);
    }
}
