//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::config::HttpConfig;
use crate::error::{As2Error, Result};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Path of the AS2 endpoint
    pub path: String,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable request logging
    pub logging: bool,
    /// CORS enabled
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4080),
            path: "/as2".to_string(),
            max_body_size: 50 * 1024 * 1024, // 50MB
            logging: true,
            cors_enabled: false,
        }
    }
}

impl ServerConfig {
    /// Build from the HTTP section of the configuration file.
    pub fn from_http(config: &HttpConfig) -> Result<Self> {
        let addr = config
            .listen_addr()
            .parse()
            .map_err(|e| As2Error::Config(format!("Invalid listen address {}: {e}", config.listen_addr())))?;
        Ok(Self {
            addr,
            path: normalize_path(&config.path),
            max_body_size: config.max_body_size,
            ..Self::default()
        })
    }

    /// Create with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Bind to all interfaces
    pub fn bind_all(mut self) -> Self {
        self.addr.set_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        self
    }

    /// Set address directly
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the AS2 endpoint path
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = normalize_path(path);
        self
    }

    /// Set max body size
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Disable logging
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }

    /// Enable CORS
    pub fn with_cors(mut self) -> Self {
        self.cors_enabled = true;
        self
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ServerConfig::default().with_port(8443).bind_all().with_path("inbox/");
        assert_eq!(config.addr.to_string(), "0.0.0.0:8443");
        assert_eq!(config.path, "/inbox");
    }

    #[test]
    fn test_from_http() {
        let http = HttpConfig {
            host: "0.0.0.0".into(),
            port: 10080,
            path: "as2".into(),
            ..HttpConfig::default()
        };
        let config = ServerConfig::from_http(&http).unwrap();
        assert_eq!(config.addr.port(), 10080);
        assert_eq!(config.path, "/as2");
        assert_eq!(config.max_body_size, http.max_body_size);
    }

    #[test]
    fn test_from_http_bad_host() {
        let http = HttpConfig {
            host: "not a host".into(),
            ..HttpConfig::default()
        };
        assert!(ServerConfig::from_http(&http).unwrap_err().is_configuration());
    }
}
