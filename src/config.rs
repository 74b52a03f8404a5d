//! NNTP server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Transport security of a listening endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Security {
    /// Plain TCP; STARTTLS is not offered
    Cleartext,
    /// TLS handshake precedes the greeting (typically port 563)
    ImplicitTls,
    /// Plain TCP with STARTTLS upgrade available (RFC 4642)
    ExplicitTls,
}

/// A listening endpoint: bind address plus transport security
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Endpoint {
    /// Address and port to bind
    pub addr: SocketAddr,
    /// Transport security mode
    pub security: Security,
}

/// TLS key material, loaded from PEM files at startup
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TlsMaterial {
    /// Path to the PEM certificate chain
    pub cert_pem: PathBuf,
    /// Path to the PEM private key
    pub key_pem: PathBuf,
}

/// NNTP server configuration
///
/// Contains everything the protocol engine consumes. Parsing a configuration
/// file into this struct is the caller's concern.
///
/// # Example
///
/// ```
/// use nntpd_rs::Config;
///
/// let config = Config::new("news.example.com")
///     .with_cleartext_endpoint("127.0.0.1:1190".parse().unwrap());
/// assert_eq!(config.path_host, "news.example.com");
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Endpoints to listen on
    pub endpoints: Vec<Endpoint>,

    /// Host identifier used in Path headers and generated Message-IDs
    pub path_host: String,

    /// TLS certificate and key; required for ImplicitTls/ExplicitTls endpoints
    pub tls: Option<TlsMaterial>,

    /// Newsgroup hierarchy delimiter (default `.`)
    pub hierarchy_delimiter: char,

    /// Idle read timeout; expired sessions get `400` and are closed
    pub idle_timeout: Duration,

    /// Per-write timeout; expired sessions are closed silently
    pub write_timeout: Duration,

    /// Maximum accepted command/header line length in bytes
    pub max_line_length: usize,

    /// Maximum accepted article size in bytes (POST/IHAVE/TAKETHIS input)
    pub max_article_bytes: usize,

    /// Whether posting is allowed at all (`200` vs `201` greeting)
    pub allow_posting: bool,

    /// Require authentication before reader commands (LIST, GROUP, ARTICLE, ...)
    pub require_auth: bool,
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_LINE_LENGTH: usize = 4096;
const DEFAULT_MAX_ARTICLE_BYTES: usize = 8 * 1024 * 1024;

impl Config {
    /// Create a configuration with defaults and no endpoints
    ///
    /// # Arguments
    ///
    /// * `path_host` - host identifier for Path headers and Message-IDs
    pub fn new(path_host: impl Into<String>) -> Self {
        Self {
            endpoints: Vec::new(),
            path_host: path_host.into(),
            tls: None,
            hierarchy_delimiter: '.',
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_article_bytes: DEFAULT_MAX_ARTICLE_BYTES,
            allow_posting: true,
            require_auth: false,
        }
    }

    /// Add a cleartext endpoint (typically port 119)
    pub fn with_cleartext_endpoint(mut self, addr: SocketAddr) -> Self {
        self.endpoints.push(Endpoint {
            addr,
            security: Security::Cleartext,
        });
        self
    }

    /// Add an implicit-TLS endpoint (typically port 563)
    pub fn with_implicit_tls_endpoint(mut self, addr: SocketAddr) -> Self {
        self.endpoints.push(Endpoint {
            addr,
            security: Security::ImplicitTls,
        });
        self
    }

    /// Add a cleartext endpoint that offers STARTTLS
    pub fn with_explicit_tls_endpoint(mut self, addr: SocketAddr) -> Self {
        self.endpoints.push(Endpoint {
            addr,
            security: Security::ExplicitTls,
        });
        self
    }

    /// Set the TLS certificate and private key PEM files
    pub fn with_tls_material(
        mut self,
        cert_pem: impl Into<PathBuf>,
        key_pem: impl Into<PathBuf>,
    ) -> Self {
        self.tls = Some(TlsMaterial {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        });
        self
    }

    /// Require authentication before reader commands
    pub fn with_required_auth(mut self) -> Self {
        self.require_auth = true;
        self
    }

    /// Disallow posting entirely (`201` greeting, no POST capability)
    pub fn without_posting(mut self) -> Self {
        self.allow_posting = false;
        self
    }

    /// Override the idle read timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Override the per-write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}
