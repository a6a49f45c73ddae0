//! Listener bring-up and coordinated shutdown.
//!
//! Dual-bind mode launches two independent server tasks: HTTPS serves the
//! application, HTTP serves a redirect-only handler. When either task
//! finishes, the other is drained within the shared timeout, and errors
//! from both legs are surfaced together.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use futures_util::future::BoxFuture;
use tokio::task::JoinError;

use super::Server;
use crate::config::{normalize_bind, CONF_BASEURI, CONF_SSL_CERT, CONF_SSL_KEY};
use crate::error::{ConfigError, ServeError};
use crate::lifecycle::Shutdown;

/// Seam for serving the application over a FastCGI transport. The transport
/// implementation lives outside this crate; it is expected to stop serving
/// when `shutdown` triggers.
pub trait FcgiTransport: Send + Sync + 'static {
    fn serve(
        &self,
        addr: SocketAddr,
        app: Router,
        shutdown: Shutdown,
    ) -> BoxFuture<'static, io::Result<()>>;
}

impl Server {
    /// Drain every listener with the shared timeout once shutdown triggers.
    fn spawn_drain_watcher(&self) {
        let shutdown = self.shutdown_handle();
        let http = self.http_handle();
        let https = self.https_handle();
        let timeout = self.timeout;
        tokio::spawn(async move {
            shutdown.cancelled().await;
            tracing::info!(timeout = ?timeout, "shutdown requested, draining listeners");
            http.graceful_shutdown(Some(timeout));
            https.graceful_shutdown(Some(timeout));
        });
    }

    fn tls_material(&self) -> Result<(PathBuf, PathBuf), ConfigError> {
        let cert = self.conf.get(CONF_SSL_CERT);
        let key = self.conf.get(CONF_SSL_KEY);
        if cert.is_empty() || key.is_empty() {
            return Err(ConfigError::MissingTlsMaterial {
                prefix: self.conf.env_prefix().to_string(),
            });
        }
        Ok((cert.into(), key.into()))
    }

    pub(super) async fn serve_http(&self, addr: &str) -> Result<(), ServeError> {
        let addr = normalize_bind(addr).map_err(ServeError::Config)?;
        let app = self.app();
        self.spawn_drain_watcher();
        tracing::info!(%addr, "binding HTTP");
        axum_server::bind(addr)
            .handle(self.http_handle())
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(ServeError::Http)
    }

    pub(super) async fn serve_https(&self, addr: &str) -> Result<(), ServeError> {
        let addr = normalize_bind(addr).map_err(ServeError::Config)?;
        let (cert, key) = self.tls_material()?;
        let app = self.app();
        self.spawn_drain_watcher();
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(ServeError::Https)?;
        tracing::info!(%addr, "binding HTTPS");
        axum_server::bind_rustls(addr, tls)
            .handle(self.https_handle())
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(ServeError::Https)
    }

    /// Serve the application over HTTPS and a redirect-only handler over
    /// HTTP, concurrently.
    pub(super) async fn serve_both(
        &self,
        https_addr: &str,
        http_addr: &str,
    ) -> Result<(), ServeError> {
        // Configuration errors must fire before any listener opens.
        let base_uri = self.conf.get(CONF_BASEURI);
        if base_uri.is_empty() {
            return Err(ConfigError::MissingBaseUri {
                prefix: self.conf.env_prefix().to_string(),
            }
            .into());
        }
        let (cert, key) = self.tls_material()?;
        let https_addr = normalize_bind(https_addr).map_err(ServeError::Config)?;
        let http_addr = normalize_bind(http_addr).map_err(ServeError::Config)?;

        let app = self.app();
        let redirect = redirect_router(base_uri);
        self.spawn_drain_watcher();

        let https_handle = self.https_handle();
        let mut https_task = tokio::spawn(async move {
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            tracing::info!(addr = %https_addr, "binding HTTPS");
            axum_server::bind_rustls(https_addr, tls)
                .handle(https_handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await
        });

        let http_handle = self.http_handle();
        let mut http_task = tokio::spawn(async move {
            tracing::info!(addr = %http_addr, "binding HTTP redirect");
            axum_server::bind(http_addr)
                .handle(http_handle)
                .serve(redirect.into_make_service_with_connect_info::<SocketAddr>())
                .await
        });

        // Wait for either task to finish, then drain the sibling within the
        // shared timeout. Returns only after both tasks have completed, so
        // no listener outlives the other.
        let timeout = self.timeout;
        let (https_result, http_result) = tokio::select! {
            result = &mut https_task => {
                tracing::info!("HTTPS task finished, stopping HTTP");
                self.http_handle.graceful_shutdown(Some(timeout));
                (flatten_join(result), flatten_join(http_task.await))
            }
            result = &mut http_task => {
                tracing::info!("HTTP task finished, stopping HTTPS");
                self.https_handle.graceful_shutdown(Some(timeout));
                (flatten_join(https_task.await), flatten_join(result))
            }
        };

        match (https_result, http_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(https), Ok(())) => Err(ServeError::Https(https)),
            (Ok(()), Err(http)) => Err(ServeError::Http(http)),
            (Err(https), Err(http)) => Err(ServeError::Both { https, http }),
        }
    }

    pub(super) async fn serve_fcgi(&self, addr: &str) -> Result<(), ServeError> {
        let transport = self
            .fcgi
            .clone()
            .ok_or_else(|| ConfigError::MissingFcgiTransport {
                prefix: self.conf.env_prefix().to_string(),
            })?;
        let addr = normalize_bind(addr).map_err(ServeError::Config)?;
        let app = self.app();
        tracing::info!(%addr, "binding FastCGI");
        transport
            .serve(addr, app, self.shutdown_handle())
            .await
            .map_err(ServeError::Fcgi)
    }
}

fn flatten_join(result: Result<io::Result<()>, JoinError>) -> io::Result<()> {
    match result {
        Ok(inner) => inner,
        Err(join) => Err(io::Error::other(join)),
    }
}

/// Redirect-only application served on the HTTP leg of dual mode: every
/// request is 302-redirected to the base URI.
pub(crate) fn redirect_router(base_uri: String) -> Router {
    Router::new().fallback(move |_req: Request<Body>| {
        let location = base_uri.clone();
        async move { (StatusCode::FOUND, [(header::LOCATION, location)]).into_response() }
    })
}
