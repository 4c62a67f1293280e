//! Connection settings: Patroni YAML or direct flags.

use certsync_engine::TlsMaterial;
use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors resolving where and how to connect.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting is absent.
    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// The `etcd3` section of a Patroni configuration file.
///
/// Every other section is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Etcd3Section {
    /// Full URL of one member.
    #[serde(default)]
    pub url: Option<String>,
    /// `host:port` of one member.
    #[serde(default)]
    pub host: Option<String>,
    /// Several members, as a list or a comma-separated string.
    #[serde(default)]
    pub hosts: Option<Hosts>,
    /// Scheme used with `host`/`hosts`; defaults to `https`.
    #[serde(default)]
    pub protocol: Option<String>,
    /// CA bundle.
    #[serde(default, alias = "cacert")]
    pub ca: Option<PathBuf>,
    /// Client certificate.
    #[serde(default)]
    pub cert: Option<PathBuf>,
    /// Client private key.
    #[serde(default)]
    pub key: Option<PathBuf>,
}

/// The two spellings Patroni accepts for `hosts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Hosts {
    /// `hosts: [a:2379, b:2379]`
    List(Vec<String>),
    /// `hosts: a:2379,b:2379`
    Text(String),
}

impl Hosts {
    fn first(&self) -> Option<String> {
        match self {
            Hosts::List(list) => list.iter().map(|h| h.trim()).find(|h| !h.is_empty()),
            Hosts::Text(text) => text.split(',').map(str::trim).find(|h| !h.is_empty()),
        }
        .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct PatroniConfig {
    #[serde(default)]
    etcd3: Option<Etcd3Section>,
}

impl Etcd3Section {
    /// Parses the `etcd3` section out of a whole Patroni document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let config: PatroniConfig = serde_yaml::from_str(text)?;
        Ok(config.etcd3.unwrap_or_default())
    }

    /// Reads and parses a Patroni file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The endpoint to talk to: `url`, else `host`, else the first of
    /// `hosts`.
    pub fn endpoint(&self) -> Option<String> {
        if let Some(url) = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| self.hosts.as_ref().and_then(Hosts::first))?;

        if host.contains("://") {
            return Some(host);
        }
        let protocol = self.protocol.as_deref().unwrap_or("https");
        Some(format!("{protocol}://{host}"))
    }

    /// Resolves into connection settings.
    pub fn into_connection(self) -> Result<Connection, ConfigError> {
        let endpoint = self.endpoint().ok_or(ConfigError::Missing("etcd3.url"))?;
        Ok(Connection {
            endpoint,
            tls: TlsMaterial::new(
                self.ca.ok_or(ConfigError::Missing("etcd3.ca"))?,
                self.cert.ok_or(ConfigError::Missing("etcd3.cert"))?,
                self.key.ok_or(ConfigError::Missing("etcd3.key"))?,
            ),
        })
    }
}

/// Where to connect and with which TLS material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Base URL of one etcd member.
    pub endpoint: String,
    /// Mutual-TLS material.
    pub tls: TlsMaterial,
}

/// Flags selecting the etcd connection.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Patroni YAML file with an `etcd3` section
    #[arg(short, long, conflicts_with_all = ["endpoint", "ca_file", "cert_file", "key_file"])]
    pub config: Option<PathBuf>,

    /// etcd endpoint URL (e.g. https://etcd1:2379)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// CA bundle for the etcd connection
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate for the etcd connection
    #[arg(long)]
    pub cert_file: Option<PathBuf>,

    /// Client private key for the etcd connection
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Request timeout in seconds (at least 1)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
}

impl ConnectionArgs {
    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Resolves the flags, loading the YAML file if one was given.
    pub fn resolve(&self) -> Result<Connection, ConfigError> {
        if let Some(path) = &self.config {
            return Etcd3Section::load(path)?.into_connection();
        }
        Ok(Connection {
            endpoint: self
                .endpoint
                .clone()
                .ok_or(ConfigError::Missing("--endpoint or --config"))?,
            tls: TlsMaterial::new(
                self.ca_file.clone().ok_or(ConfigError::Missing("--ca-file"))?,
                self.cert_file
                    .clone()
                    .ok_or(ConfigError::Missing("--cert-file"))?,
                self.key_file.clone().ok_or(ConfigError::Missing("--key-file"))?,
            ),
        })
    }
}
