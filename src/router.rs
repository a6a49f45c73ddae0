//! Routing adapter: registration surface and the per-request dispatch
//! pipeline.
//!
//! The URL-pattern matching itself belongs to axum; this module owns what
//! happens around a match: client-IP extraction, view copy, context and
//! tracker construction, handler invocation, and the unconditional render
//! step afterward.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::RawPathParams;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{self, MethodFilter};
use axum::Router;
use futures_util::future::BoxFuture;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Conf, CONF_NO_COMPRESS, CONF_NO_LOG};
use crate::context::{extract_client_ip, Params, RequestContext};
use crate::lifecycle::Shutdown;
use crate::render::Renderer;
use crate::response::ResponseTracker;
use crate::view::View;

/// Everything a handler owns for the duration of one request.
pub struct Exchange {
    pub ctx: RequestContext,
    pub response: ResponseTracker,
}

/// Request handler: owns the exchange while it runs, hands it back for
/// rendering.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, exchange: Exchange) -> BoxFuture<'static, Exchange>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Exchange> + Send + 'static,
{
    fn handle(&self, exchange: Exchange) -> BoxFuture<'static, Exchange> {
        Box::pin(self(exchange))
    }
}

pub(crate) struct Route {
    pub method: Method,
    pub pattern: String,
    pub handler: Arc<dyn Handler>,
    /// Server default merged with the route override at registration time.
    pub view: View,
}

pub(crate) struct StaticRoute {
    pub prefix: String,
    pub root: PathBuf,
}

/// Build the axum router for the registered routes and middleware flags.
pub(crate) fn build_router(
    routes: &[Route],
    statics: &[StaticRoute],
    renderer: Arc<Renderer>,
    shutdown: Shutdown,
    conf: &Conf,
) -> Router {
    let mut router = Router::new();
    for route in routes {
        let filter = match MethodFilter::try_from(route.method.clone()) {
            Ok(filter) => filter,
            Err(err) => {
                tracing::error!(method = %route.method, error = %err, "unsupported method, skipping route");
                continue;
            }
        };
        let handler = route.handler.clone();
        let view = route.view.clone();
        let renderer = renderer.clone();
        let shutdown = shutdown.clone();
        router = router.route(
            &route.pattern,
            routing::on(filter, move |params: RawPathParams, req: Request<Body>| {
                let handler = handler.clone();
                let view = view.clone();
                let renderer = renderer.clone();
                let shutdown = shutdown.clone();
                async move { dispatch(handler, view, renderer, shutdown, params, req).await }
            }),
        );
    }
    for fixed in statics {
        router = router.nest_service(&fixed.prefix, ServeDir::new(&fixed.root));
    }
    if conf.get(CONF_NO_COMPRESS).is_empty() {
        tracing::debug!("enabling response compression");
        router = router.layer(CompressionLayer::new());
    }
    if conf.get(CONF_NO_LOG).is_empty() {
        tracing::debug!("enabling request logging");
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// Per-request pipeline: context construction, handler, then render.
async fn dispatch(
    handler: Arc<dyn Handler>,
    view: View,
    renderer: Arc<Renderer>,
    shutdown: Shutdown,
    raw_params: RawPathParams,
    req: Request<Body>,
) -> Response {
    let client_ip = match extract_client_ip(&req) {
        Ok(ip) => ip,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting request with unparsable remote address");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let mut params = Params::new();
    for (name, value) in raw_params.iter() {
        params.insert(name.to_string(), value.to_string());
    }
    let path = req.uri().path().to_string();

    let ctx = RequestContext::new(params, view.per_request_copy(), client_ip, path, shutdown);
    let exchange = Exchange {
        ctx,
        response: ResponseTracker::new(),
    };

    let mut exchange = handler.handle(exchange).await;

    // Rendering is the default response-production path, not an opt-in.
    renderer.render(&exchange.ctx, &mut exchange.response);
    exchange.response.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RemoteAddr;
    use crate::render::TemplateCache;
    use crate::view::FunctionMap;
    use axum::extract::ConnectInfo;
    use std::fs;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(dir: &TempDir, routes: Vec<Route>) -> Router {
        let renderer = Arc::new(Renderer::new(
            TemplateCache::new(Some(dir.path().to_path_buf()), FunctionMap::new())
                .with_refresh_interval(Duration::ZERO),
        ));
        let mut conf = Conf::new("ROUTERTEST");
        conf.set(CONF_NO_LOG, "1");
        conf.set(CONF_NO_COMPRESS, "1");
        build_router(&routes, &[], renderer, Shutdown::new(), &conf)
    }

    fn stash_route(pattern: &str, view: &str) -> Route {
        let view = View::named(view);
        Route {
            method: Method::GET,
            pattern: pattern.to_string(),
            handler: Arc::new(|mut x: Exchange| async move {
                let name = x.ctx.param("name").unwrap_or("world").to_string();
                x.ctx.stash_insert("title", name);
                x
            }),
            view,
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn with_peer(mut req: Request<Body>) -> Request<Body> {
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("127.0.0.1:50000".parse().unwrap()));
        req
    }

    #[tokio::test]
    async fn dispatch_renders_after_handler() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("home"), "<p>{{ title }}</p>").unwrap();
        let router = test_router(&dir, vec![stash_route("/hello/{name}", "home")]);

        let req = with_peer(
            Request::builder()
                .uri("/hello/stout")
                .body(Body::empty())
                .unwrap(),
        );
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<p>stout</p>");
    }

    #[tokio::test]
    async fn unparsable_remote_addr_is_400() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("home"), "unused").unwrap();
        let router = test_router(&dir, vec![stash_route("/", "home")]);

        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut().insert(RemoteAddr("localhost".into()));
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("is not IP:port"), "{body}");
    }

    #[tokio::test]
    async fn handler_output_suppresses_rendering() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("home"), "template output").unwrap();
        let route = Route {
            method: Method::GET,
            pattern: "/".to_string(),
            handler: Arc::new(|mut x: Exchange| async move {
                x.response.write_status(StatusCode::ACCEPTED);
                x.response.write(b"handler says hi");
                x
            }),
            view: View::named("home"),
        };
        let router = test_router(&dir, vec![route]);

        let req = with_peer(Request::builder().uri("/").body(Body::empty()).unwrap());
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_string(response).await, "handler says hi");
    }

    #[tokio::test]
    async fn route_without_view_renders_500() {
        let dir = TempDir::new().unwrap();
        let route = Route {
            method: Method::GET,
            pattern: "/bare".to_string(),
            handler: Arc::new(|x: Exchange| async move { x }),
            view: View::default(),
        };
        let router = test_router(&dir, vec![route]);

        let req = with_peer(Request::builder().uri("/bare").body(Body::empty()).unwrap());
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert!(body.contains("No view defined for /bare"), "{body}");
    }
}
