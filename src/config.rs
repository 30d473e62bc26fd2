//! Server configuration.
//!
//! Every field has a default, so a config file only needs the settings it
//! changes. Environment variables override the defaults through
//! [`ServerConfig::from_env`]:
//!
//! | Variable | Maps to |
//! |----------|---------|
//! | `SEED_ADDR` | `addr` |
//! | `SEED_SHUTDOWN_GRACE_SECS` | `shutdown_grace_secs` |
//! | `SEED_MAX_BODY_SIZE` | `max_body_size` |
//! | `SEED_TLS_CERT` | `tls.cert` (together with `SEED_TLS_KEY`) |
//! | `SEED_TLS_KEY` | `tls.key` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::router::DEFAULT_MAX_BODY_SIZE;

pub const ENV_ADDR: &str = "SEED_ADDR";
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "SEED_SHUTDOWN_GRACE_SECS";
pub const ENV_MAX_BODY_SIZE: &str = "SEED_MAX_BODY_SIZE";
pub const ENV_TLS_CERT: &str = "SEED_TLS_CERT";
pub const ENV_TLS_KEY: &str = "SEED_TLS_KEY";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub addr: String,

    /// How long SIGTERM / Ctrl-C waits for in-flight connections before
    /// aborting them.
    pub shutdown_grace_secs: u64,

    /// Request bodies longer than this many bytes are answered with `413`.
    pub max_body_size: usize,

    /// PEM certificate chain and private key for [`Server::run_tls`](crate::Server).
    pub tls: Option<TlsConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_owned(),
            shutdown_grace_secs: 30,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the `SEED_*` environment variables that are set.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    /// Blank values count as unset. TLS is enabled only when both the
    /// certificate and the key are given.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let mut config = Self::default();
        if let Some(addr) = read(ENV_ADDR) {
            config.addr = addr;
        }
        if let Some(secs) = read(ENV_SHUTDOWN_GRACE_SECS) {
            config.shutdown_grace_secs = parse(ENV_SHUTDOWN_GRACE_SECS, secs)?;
        }
        if let Some(limit) = read(ENV_MAX_BODY_SIZE) {
            config.max_body_size = parse(ENV_MAX_BODY_SIZE, limit)?;
        }
        if let (Some(cert), Some(key)) = (read(ENV_TLS_CERT), read(ENV_TLS_KEY)) {
            config.tls = Some(TlsConfig { cert: cert.into(), key: key.into() });
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        self.addr.parse().map_err(|_| Error::InvalidAddress(self.addr.clone()))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, Error> {
    value.parse().map_err(|_| Error::InvalidConfig { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.shutdown_grace(), Duration::from_secs(30));
        assert!(config.tls.is_none());
    }

    #[test]
    fn partial_json_keeps_the_other_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"shutdown_grace_secs": 5}"#).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));

        let config: ServerConfig =
            serde_json::from_str(r#"{"tls": {"cert": "c.pem", "key": "k.pem"}}"#).unwrap();
        assert_eq!(config.tls.unwrap().key, PathBuf::from("k.pem"));
    }

    fn vars(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let pairs = pairs.to_vec();
        move |name| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| (*v).to_owned())
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = ServerConfig::from_lookup(vars(&[
            (ENV_ADDR, " 127.0.0.1:9000 "),
            (ENV_SHUTDOWN_GRACE_SECS, "5"),
            (ENV_MAX_BODY_SIZE, "1024"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.max_body_size, 1024);
        assert!(config.tls.is_none());
    }

    #[test]
    fn unparseable_grace_is_rejected() {
        let err = ServerConfig::from_lookup(vars(&[(ENV_SHUTDOWN_GRACE_SECS, "soon")])).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfig { var: ENV_SHUTDOWN_GRACE_SECS, ref value } if value == "soon"
        ));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ServerConfig::from_lookup(vars(&[(ENV_ADDR, "  "), (ENV_SHUTDOWN_GRACE_SECS, "")])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.shutdown_grace_secs, 30);
    }

    #[test]
    fn tls_needs_both_cert_and_key() {
        let config = ServerConfig::from_lookup(vars(&[(ENV_TLS_CERT, "cert.pem")])).unwrap();
        assert!(config.tls.is_none());

        let config = ServerConfig::from_lookup(vars(&[(ENV_TLS_KEY, "key.pem")])).unwrap();
        assert!(config.tls.is_none());

        let config =
            ServerConfig::from_lookup(vars(&[(ENV_TLS_CERT, "cert.pem"), (ENV_TLS_KEY, "key.pem")])).unwrap();
        let tls = config.tls.unwrap();
        assert_eq!(tls.cert, PathBuf::from("cert.pem"));
        assert_eq!(tls.key, PathBuf::from("key.pem"));
    }

    #[test]
    fn bad_address_is_an_error() {
        let config = ServerConfig { addr: "localhost".to_owned(), ..ServerConfig::default() };
        assert!(matches!(config.socket_addr(), Err(Error::InvalidAddress(a)) if a == "localhost"));
    }
}
