//! Server configuration
//!
//! Merged from, lowest to highest precedence: built-in defaults, a TOML
//! file, `CHAT_SERVER_*` environment variables, command-line flags.
//! Environment and flags are both handled by clap.

use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::handler::Limits;

/// Default server address
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10010;

/// File searched for in the working directory when `--config` is absent
const LOCAL_CONFIG: &str = "config.toml";
const SYSTEM_CONFIG: &str = "/etc/chatserver/config.toml";

/// Command line / environment options
#[derive(Debug, Default, Parser)]
#[command(name = "roomcast", version, about = "Multi-room text-protocol chat server")]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "CHAT_SERVER_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long = "socket-host", env = "CHAT_SERVER_SOCKET_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long = "socket-port", env = "CHAT_SERVER_SOCKET_PORT")]
    pub port: Option<u16>,

    /// Maximum concurrent connections
    #[arg(long, env = "CHAT_SERVER_MAX_CLIENTS")]
    pub max_clients: Option<usize>,

    /// Maximum message body length in characters
    #[arg(long, env = "CHAT_SERVER_MAX_MESSAGE_LENGTH")]
    pub max_message_length: Option<usize>,

    /// Enable TLS (requires --cert-path)
    #[arg(
        long = "use-tls",
        env = "CHAT_SERVER_USE_TLS",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub use_tls: Option<bool>,

    /// PEM certificate chain
    #[arg(long, env = "CHAT_SERVER_CERT_PATH")]
    pub cert_path: Option<PathBuf>,

    /// PEM private key (defaults to the certificate file)
    #[arg(long, env = "CHAT_SERVER_KEY_PATH")]
    pub key_path: Option<PathBuf>,
}

/// Layout of the config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    chatserver: FileSettings,
}

/// `[chatserver]` table; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    host: Option<String>,
    port: Option<u16>,
    max_clients: Option<usize>,
    max_message_length: Option<usize>,
    use_tls: Option<bool>,
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
}

impl FileSettings {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(file.chatserver)
    }
}

/// Default config file locations, in search order
fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(
            PathBuf::from(home)
                .join(".config")
                .join("chatserver")
                .join("config.toml"),
        );
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG));
    paths
}

/// Effective server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_clients: usize,
    pub max_message_length: usize,
    pub use_tls: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// File the settings were read from, if any
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_clients: limits.max_clients,
            max_message_length: limits.max_message_length,
            use_tls: false,
            cert_path: None,
            key_path: None,
            config_file: None,
        }
    }
}

impl Config {
    /// Parse the process arguments and environment, then merge
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    /// Merge defaults, config file and already-parsed options
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => Some((path.clone(), FileSettings::read(path)?)),
            None => match default_locations().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    let settings = FileSettings::read(&path)?;
                    Some((path, settings))
                }
                None => {
                    debug!("No config file found, using defaults");
                    None
                }
            },
        };

        let mut config = Config::default();
        if let Some((path, settings)) = file {
            config.apply_file(settings);
            config.config_file = Some(path);
        }
        config.apply_cli(cli);
        Ok(config)
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(max) = file.max_clients {
            self.max_clients = max;
        }
        if let Some(max) = file.max_message_length {
            self.max_message_length = max;
        }
        if let Some(use_tls) = file.use_tls {
            self.use_tls = use_tls;
        }
        if file.cert_path.is_some() {
            self.cert_path = file.cert_path;
        }
        if file.key_path.is_some() {
            self.key_path = file.key_path;
        }
    }

    fn apply_cli(&mut self, cli: Cli) {
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(max) = cli.max_clients {
            self.max_clients = max;
        }
        if let Some(max) = cli.max_message_length {
            self.max_message_length = max;
        }
        if let Some(use_tls) = cli.use_tls {
            self.use_tls = use_tls;
        }
        if cli.cert_path.is_some() {
            self.cert_path = cli.cert_path;
        }
        if cli.key_path.is_some() {
            self.key_path = cli.key_path;
        }
    }

    /// Reject TLS without a certificate
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_tls && self.cert_path.is_none() {
            return Err(ConfigError::MissingCertificate);
        }
        Ok(())
    }

    /// Certificate and key paths when TLS is enabled
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        if !self.use_tls {
            return None;
        }
        let cert = self.cert_path.as_deref()?;
        let key = self.key_path.as_deref().unwrap_or(cert);
        Some((cert, key))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_clients: self.max_clients,
            max_message_length: self.max_message_length,
        }
    }
}
