//! Configuration source.
//!
//! # Responsibilities
//! - Resolve configuration keys from the process environment
//! - Apply explicit overrides set by the embedding application
//! - Provide defaults for the keys that have them
//!
//! Lookup order: explicit override, then `PREFIX_KEY` in the environment,
//! then the built-in default, then the empty string.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

use crate::error::ConfigError;

/// Config key for the HTTP bind address.
pub const CONF_HTTP_BIND: &str = "HTTP_BIND";
/// Config key for the HTTPS bind address.
pub const CONF_HTTPS_BIND: &str = "HTTPS_BIND";
/// Config key for the TLS certificate file path.
pub const CONF_SSL_CERT: &str = "SSL_CERT";
/// Config key for the TLS private key file path.
pub const CONF_SSL_KEY: &str = "SSL_KEY";
/// Config key for the FastCGI bind address.
pub const CONF_FASTCGI_BIND: &str = "FASTCGI_BIND";
/// Config key for the redirect target used by the HTTP leg in dual mode.
pub const CONF_BASEURI: &str = "BASEURI";
/// Config key for the template directory.
pub const CONF_TEMPLATE_DIR: &str = "TEMPLATE_DIR";
/// Flag key: any non-empty value disables request logging.
pub const CONF_NO_LOG: &str = "NO_LOG";
/// Flag key: any non-empty value disables response compression.
pub const CONF_NO_COMPRESS: &str = "NO_COMPRESS";

/// Environment-backed configuration with explicit overrides.
#[derive(Debug, Clone)]
pub struct Conf {
    prefix: String,
    overrides: HashMap<String, String>,
}

impl Conf {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// The environment prefix, used both for lookups and in error messages.
    pub fn env_prefix(&self) -> &str {
        &self.prefix
    }

    /// Set a configuration value, taking precedence over the environment.
    /// Setting the empty string is meaningful: it disables keys with
    /// non-empty defaults.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Retrieve a configuration value, or the empty string if unset.
    pub fn get(&self, key: &str) -> String {
        if let Some(value) = self.overrides.get(key) {
            return value.clone();
        }
        if let Ok(value) = env::var(format!("{}_{}", self.prefix, key)) {
            return value;
        }
        default_for(key).unwrap_or_default().to_string()
    }
}

fn default_for(key: &str) -> Option<&'static str> {
    match key {
        CONF_HTTP_BIND => Some(":8080"),
        _ => None,
    }
}

/// Parse a bind address, accepting the `:8080` shorthand for all interfaces.
pub fn normalize_bind(addr: &str) -> Result<SocketAddr, ConfigError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    full.parse().map_err(|source| ConfigError::InvalidBindAddress {
        addr: addr.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_environment() {
        env::set_var("CONFTESTA_HTTP_BIND", ":9999");
        let mut conf = Conf::new("CONFTESTA");
        assert_eq!(conf.get(CONF_HTTP_BIND), ":9999");
        conf.set(CONF_HTTP_BIND, ":7777");
        assert_eq!(conf.get(CONF_HTTP_BIND), ":7777");
    }

    #[test]
    fn http_bind_has_default() {
        let conf = Conf::new("CONFTESTB");
        assert_eq!(conf.get(CONF_HTTP_BIND), ":8080");
    }

    #[test]
    fn unset_key_is_empty() {
        let conf = Conf::new("CONFTESTC");
        assert_eq!(conf.get(CONF_BASEURI), "");
    }

    #[test]
    fn empty_override_disables_default() {
        let mut conf = Conf::new("CONFTESTD");
        conf.set(CONF_HTTP_BIND, "");
        assert_eq!(conf.get(CONF_HTTP_BIND), "");
    }

    #[test]
    fn normalize_accepts_shorthand() {
        let addr = normalize_bind(":8080").unwrap();
        assert_eq!(addr.port(), 8080);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize_bind("not-an-address").is_err());
    }
}
