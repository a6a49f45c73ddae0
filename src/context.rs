//! Per-request state threaded from dispatch through handler to renderer.
//!
//! A [`RequestContext`] is created when the router matches a request and
//! dropped once the response is written; it is never retained beyond the
//! request. Route parameters and the client IP are fixed at construction;
//! the stash and the selected view belong to the request's task alone.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use minijinja::value::Value;
use serde::Serialize;

use crate::error::ClientIpError;
use crate::lifecycle::Shutdown;
use crate::view::View;

/// Route parameters extracted by the router match.
pub type Params = HashMap<String, String>;

/// Ephemeral key/value bag used to pass data from handler logic to the
/// renderer.
pub type Stash = BTreeMap<String, Value>;

/// Remote address carried as a string when no typed socket address is
/// available (FastCGI transports, in-process tests).
#[derive(Debug, Clone)]
pub struct RemoteAddr(pub String);

pub struct RequestContext {
    params: Params,
    stash: Stash,
    view: View,
    client_ip: IpAddr,
    path: String,
    shutdown: Shutdown,
}

impl RequestContext {
    pub(crate) fn new(
        params: Params,
        view: View,
        client_ip: IpAddr,
        path: String,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            params,
            stash: Stash::new(),
            view,
            client_ip,
            path,
            shutdown,
        }
    }

    /// A single route parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    pub fn stash_mut(&mut self) -> &mut Stash {
        &mut self.stash
    }

    /// Stash any serializable value under `key`.
    pub fn stash_insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.stash.insert(key.into(), Value::from_serialize(&value));
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    /// Select a different view for this request.
    pub fn select_view(&mut self, name: impl Into<String>) {
        self.view.view = name.into();
    }

    /// The client IP, parsed once at dispatch.
    pub fn client_ip(&self) -> IpAddr {
        self.client_ip
    }

    /// The request path, as matched by the router.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolves when the server begins shutting down. Long-running handlers
    /// should observe this and wind down.
    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await
    }
}

/// Extract the client IP from a request.
///
/// Prefers the typed socket address the listener recorded; falls back to a
/// [`RemoteAddr`] string extension, which must be in `ip:port` form.
pub fn extract_client_ip<B>(req: &Request<B>) -> Result<IpAddr, ClientIpError> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Ok(addr.ip());
    }
    let raw = req
        .extensions()
        .get::<RemoteAddr>()
        .map(|r| r.0.as_str())
        .unwrap_or("");
    let sock: SocketAddr = raw.parse().map_err(|_| ClientIpError {
        addr: raw.to_string(),
    })?;
    Ok(sock.ip())
}
