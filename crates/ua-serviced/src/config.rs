//! Configuration for ua-serviced (§6 "Configuration inputs").
//!
//! Grounded on `gossipd::config::Config`: a `clap::Parser` struct with an
//! `anyhow`-based `validate()`, `env` fallbacks for secrets, and comma/file
//! inputs for anything that would otherwise be a separate document. The XML
//! endpoint/client/UANodeSet/users documents named in §6 are out of scope
//! (external loaders); `--address-space` accepts the already-parsed node set
//! those loaders would have produced, per `SPEC_FULL.md` §1's note that XML
//! loaders are external collaborators accessed only through their contracts.

use clap::Parser;
use std::path::PathBuf;

use crate::session::DEFAULT_MAX_SESSIONS;

/// ua-serviced - OPC UA service dispatch core daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "ua-serviced")]
#[command(about = "OPC UA service dispatch core")]
pub struct ServerConfig {
    /// Endpoint URL advertised to clients and returned by GetEndpoints.
    #[arg(long, default_value = "opc.tcp://0.0.0.0:4840")]
    pub endpoint_url: String,

    /// Application URI identifying this server instance.
    #[arg(long, env = "UA_APPLICATION_URI", default_value = "urn:ua-serviced:server")]
    pub application_uri: String,

    /// Product URI.
    #[arg(long, default_value = "urn:ua-serviced:product")]
    pub product_uri: String,

    /// Path to a JSON file holding the already-parsed initial address-space
    /// node set (stand-in for the XML UANodeSet loader, §6).
    #[arg(long)]
    pub address_space: PathBuf,

    /// `MaxSessions` (§6 "Constants").
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
    pub max_sessions: usize,

    /// `MaxSecureConnections` (§6 "Constants").
    #[arg(long, default_value_t = 100)]
    pub max_secure_connections: usize,

    /// `MaxOperationsPerMessage` (§6 "Constants"), shared by every
    /// per-item service (Read/Write/Browse/CreateMonitoredItems).
    #[arg(long, default_value_t = 1000)]
    pub max_operations_per_message: u32,

    /// Default `timeout_hint` (ms) a client request carries when the
    /// transport layer doesn't override it (§6 "Constants").
    #[arg(long, default_value_t = 10_000)]
    pub default_request_timeout_ms: u32,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (`json` or `pretty`).
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl ServerConfig {
    /// Validate configuration (§6 "Constants" bounds).
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_sessions == 0 {
            anyhow::bail!("max-sessions must be at least 1");
        }
        if self.max_secure_connections == 0 {
            anyhow::bail!("max-secure-connections must be at least 1");
        }
        if self.max_operations_per_message == 0 {
            anyhow::bail!("max-operations-per-message must be at least 1");
        }
        if !self.endpoint_url.starts_with("opc.tcp://") {
            anyhow::bail!("endpoint-url must use the opc.tcp scheme");
        }
        Ok(())
    }
}

/// Client-side configuration (§6 "client configuration", §4.H
/// "discovery-before-channel queue"): the connection target and locale
/// preference a client uses before any session exists.
#[derive(Parser, Debug, Clone)]
#[command(name = "ua-serviced-client")]
pub struct ClientConfig {
    /// Preferred locales, most preferred first.
    #[arg(long, value_delimiter = ',', default_value = "en")]
    pub preferred_locales: Vec<String>,

    /// Server URL to connect to.
    #[arg(long, default_value = "opc.tcp://localhost:4840")]
    pub server_url: String,

    /// Optional reverse-connection endpoint URL (§6 "Connection entries").
    #[arg(long)]
    pub reverse_endpoint_url: Option<String>,

    /// Requested secure-channel lifetime in milliseconds.
    #[arg(long, default_value_t = 3_600_000)]
    pub requested_lifetime_ms: u32,
}

impl ClientConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.preferred_locales.is_empty() {
            anyhow::bail!("preferred-locales must list at least one locale");
        }
        if !self.server_url.starts_with("opc.tcp://") {
            anyhow::bail!("server-url must use the opc.tcp scheme");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_config() -> ServerConfig {
        ServerConfig {
            endpoint_url: "opc.tcp://0.0.0.0:4840".into(),
            application_uri: "urn:test:server".into(),
            product_uri: "urn:test:product".into(),
            address_space: PathBuf::from("fixtures/address_space.json"),
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_secure_connections: 10,
            max_operations_per_message: 1000,
            default_request_timeout_ms: 10_000,
            verbose: false,
            log_format: "pretty".into(),
        }
    }

    #[test]
    fn validate_rejects_zero_max_sessions() {
        let mut config = server_config();
        config.max_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_opc_tcp_endpoint_url() {
        let mut config = server_config();
        config.endpoint_url = "https://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(server_config().validate().is_ok());
    }

    #[test]
    fn client_config_rejects_empty_locale_list() {
        let config = ClientConfig {
            preferred_locales: Vec::new(),
            server_url: "opc.tcp://localhost:4840".into(),
            reverse_endpoint_url: None,
            requested_lifetime_ms: 60_000,
        };
        assert!(config.validate().is_err());
    }
}
