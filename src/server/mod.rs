//! Server orchestration.
//!
//! # Responsibilities
//! - Own the registration surface (routes, static mounts, views)
//! - Pick the bind mode from configuration (FastCGI, HTTP, HTTPS, or both)
//! - Propagate the shared shutdown timeout to every listener
//! - Coordinate dual-bind shutdown so neither listener outlives the other

mod bind;

pub use bind::FcgiTransport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum_server::Handle;

use crate::config::{Conf, CONF_FASTCGI_BIND, CONF_HTTPS_BIND, CONF_HTTP_BIND};
use crate::error::{ConfigError, ServeError};
use crate::lifecycle::{shutdown_signal, Shutdown};
use crate::render::{Renderer, TemplateCache};
use crate::router::{build_router, Handler, Route, StaticRoute};
use crate::view::View;

/// Default time to wait for in-flight requests when stopping the server.
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub struct Server {
    conf: Conf,
    timeout: Duration,
    template_dir: Option<PathBuf>,
    default_view: View,
    routes: Vec<Route>,
    statics: Vec<StaticRoute>,
    shutdown: Shutdown,
    http_handle: Handle,
    https_handle: Handle,
    fcgi: Option<Arc<dyn FcgiTransport>>,
}

impl Server {
    /// A new server instance reading configuration under `env_prefix`.
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            conf: Conf::new(env_prefix),
            timeout: TIMEOUT,
            template_dir: None,
            default_view: View::default(),
            routes: Vec::new(),
            statics: Vec::new(),
            shutdown: Shutdown::new(),
            http_handle: Handle::new(),
            https_handle: Handle::new(),
            fcgi: None,
        }
    }

    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    /// Set a configuration value, taking precedence over the environment.
    pub fn set_conf(&mut self, key: &str, value: &str) {
        self.conf.set(key, value);
    }

    /// Duration to wait for in-flight requests when stopping.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Directory holding HTML templates. A `lib/` subdirectory, when
    /// present, is loaded into every template set as shared fragments.
    pub fn set_template_dir(&mut self, dir: impl Into<PathBuf>) {
        self.template_dir = Some(dir.into());
    }

    /// Default view configuration; route overrides merge into it field by
    /// field.
    pub fn set_default_view(&mut self, view: View) {
        self.default_view = view;
    }

    /// Install the FastCGI transport used when `FASTCGI_BIND` is set.
    pub fn set_fcgi_transport(&mut self, transport: impl FcgiTransport) {
        self.fcgi = Some(Arc::new(transport));
    }

    /// Handle to request shutdown from outside the serving task.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Listener handle for the HTTP leg; reports the bound address.
    pub fn http_handle(&self) -> Handle {
        self.http_handle.clone()
    }

    /// Listener handle for the HTTPS leg; reports the bound address.
    pub fn https_handle(&self) -> Handle {
        self.https_handle.clone()
    }

    /// Register a handler for `method` on `pattern`.
    ///
    /// The route's view is the server default merged with `view`, field by
    /// field; each matched request gets its own copy.
    pub fn handle(
        &mut self,
        method: Method,
        pattern: impl Into<String>,
        handler: impl Handler,
        view: Option<View>,
    ) {
        let merged = match &view {
            Some(over) => self.default_view.merged(over),
            None => self.default_view.clone(),
        };
        let pattern = pattern.into();
        tracing::debug!(method = %method, pattern = %pattern, view = ?merged, "registering route");
        self.routes.push(Route {
            method,
            pattern,
            handler: Arc::new(handler),
            view: merged,
        });
    }

    /// Shortcut for `handle(Method::GET, ...)`.
    pub fn get(&mut self, pattern: impl Into<String>, handler: impl Handler, view: Option<View>) {
        self.handle(Method::GET, pattern, handler, view);
    }

    /// Serve files from `root` under `prefix`.
    pub fn serve_static(&mut self, prefix: impl Into<String>, root: impl Into<PathBuf>) {
        self.statics.push(StaticRoute {
            prefix: prefix.into(),
            root: root.into(),
        });
    }

    pub(crate) fn renderer(&self) -> Arc<Renderer> {
        Arc::new(Renderer::new(TemplateCache::new(
            self.template_dir.clone(),
            self.default_view.functions.clone(),
        )))
    }

    pub(crate) fn app(&self) -> axum::Router {
        build_router(
            &self.routes,
            &self.statics,
            self.renderer(),
            self.shutdown.clone(),
            &self.conf,
        )
    }

    /// Run the server until it stops.
    ///
    /// Branches on which bind addresses are configured: FastCGI wins, then
    /// HTTP and/or HTTPS. Configuration errors return before any listener
    /// opens; SIGINT/SIGTERM trigger a graceful drain bounded by the shared
    /// timeout.
    pub async fn run(self) -> Result<(), ServeError> {
        let signal_shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("stop signal received");
            signal_shutdown.trigger();
        });

        let fcgi_addr = self.conf.get(CONF_FASTCGI_BIND);
        if !fcgi_addr.is_empty() {
            return self.serve_fcgi(&fcgi_addr).await;
        }

        let http_addr = self.conf.get(CONF_HTTP_BIND);
        let https_addr = self.conf.get(CONF_HTTPS_BIND);
        tracing::debug!(http = %http_addr, https = %https_addr, "selecting bind mode");

        match (http_addr.is_empty(), https_addr.is_empty()) {
            (false, false) => self.serve_both(&https_addr, &http_addr).await,
            (false, true) => self.serve_http(&http_addr).await,
            (true, false) => self.serve_https(&https_addr).await,
            (true, true) => Err(ConfigError::NoBindAddress.into()),
        }
    }
}
