//! Error taxonomy for the serving layer.
//!
//! Startup configuration errors abort before any listener opens. Per-request
//! errors become HTTP error responses and never take down the serving task.
//! Listener errors from a dual-bind setup are collected together, not just
//! the first.

use std::io;
use std::net::AddrParseError;

use thiserror::Error;

/// Startup configuration failures. The process must not serve.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// HTTPS was requested without certificate and key file paths.
    #[error("{prefix}_SSL_CERT and {prefix}_SSL_KEY must be set to serve HTTPS")]
    MissingTlsMaterial { prefix: String },

    /// Dual-bind mode needs a redirect destination for the HTTP leg.
    #[error("{prefix}_BASEURI must be set to redirect from HTTP to HTTPS")]
    MissingBaseUri { prefix: String },

    /// A FastCGI bind address was configured but no transport was installed.
    #[error("{prefix}_FASTCGI_BIND is set but no FastCGI transport is installed")]
    MissingFcgiTransport { prefix: String },

    /// No bind address remained after configuration lookup.
    #[error("no bind address configured")]
    NoBindAddress,

    #[error("invalid bind address `{addr}`: {source}")]
    InvalidBindAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
}

/// Template compilation and lookup failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template directory configured")]
    NoTemplateDir,

    #[error("cannot read template `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse template `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: minijinja::Error,
    },

    /// The shared fragment directory exists but could not be read.
    #[error("unable to read template lib `{path}`: {source}")]
    Lib {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Per-request rendering failures, surfaced as a 500 response.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The request carries no view selection. Distinct from a template
    /// lookup failure.
    #[error("No view defined for {path}")]
    NoView { path: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("error in template `{name}`: {source}")]
    Execute {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// The remote address could not be parsed; surfaced as a 400 response.
#[derive(Debug, Error)]
#[error("userip: {addr:?} is not IP:port")]
pub struct ClientIpError {
    pub addr: String,
}

/// Listener-level failures, including aggregated dual-bind failures.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP listener failed: {0}")]
    Http(#[source] io::Error),

    #[error("HTTPS listener failed: {0}")]
    Https(#[source] io::Error),

    /// Both legs of a dual-bind setup failed; both errors are surfaced.
    #[error("HTTPS listener failed: {https}; HTTP listener failed: {http}")]
    Both { https: io::Error, http: io::Error },

    #[error("FastCGI listener failed: {0}")]
    Fcgi(#[source] io::Error),
}
