//! Rendering pipeline: resolve the view, execute against the stash, flush on
//! success.
//!
//! Output is built in a pooled buffer, not written straight to the client,
//! so an execution error discovered mid-render never leaves partial HTML in
//! the response. Only a fully rendered template reaches the tracker.

mod cache;
mod pool;

pub use cache::{CompiledView, Resolved, TemplateCache, REFRESH_INTERVAL};
pub use pool::{BufferPool, PooledBuf};

use axum::http::{header, HeaderValue, StatusCode};
use minijinja::value::Value;

use crate::context::RequestContext;
use crate::error::RenderError;
use crate::response::ResponseTracker;
use crate::view::apply_functions;

pub struct Renderer {
    cache: TemplateCache,
    pool: BufferPool,
}

impl Renderer {
    pub fn new(cache: TemplateCache) -> Self {
        Self {
            cache,
            pool: BufferPool::new(),
        }
    }

    /// Render the selected view into the response.
    ///
    /// This is the default response-production path: it runs after every
    /// handler, and is a no-op when the handler already produced output.
    /// Failures become a plain-text 500; the error text is never swallowed.
    pub fn render(&self, ctx: &RequestContext, res: &mut ResponseTracker) {
        if res.written() {
            return;
        }
        if let Err(err) = self.render_template(ctx, res) {
            tracing::error!(path = %ctx.path(), error = %err, "render failed");
            res.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            res.write_status(StatusCode::INTERNAL_SERVER_ERROR);
            res.write(format!("Error executing template: {err}\n").as_bytes());
        }
    }

    fn render_template(
        &self,
        ctx: &RequestContext,
        res: &mut ResponseTracker,
    ) -> Result<(), RenderError> {
        let view = ctx.view();
        if view.view.is_empty() {
            return Err(RenderError::NoView {
                path: ctx.path().to_string(),
            });
        }
        let template_name = if view.template.is_empty() {
            view.view.as_str()
        } else {
            view.template.as_str()
        };

        let resolved = self.cache.resolve(&view.view)?;
        if let Some(err) = resolved.refresh_error {
            // Stale content is being served; the compile failure must not
            // vanish silently.
            tracing::error!(view = %view.view, error = %err, "template refresh failed, serving stale compile");
        }

        // Per-request function overrides need a private copy of the
        // environment; the published artifact stays untouched.
        let overridden;
        let env = if view.functions.is_empty() {
            resolved.compiled.environment()
        } else {
            let mut cloned = resolved.compiled.environment().clone();
            apply_functions(&mut cloned, &view.functions);
            overridden = cloned;
            &overridden
        };

        let template =
            env.get_template(template_name)
                .map_err(|source| RenderError::Execute {
                    name: template_name.to_string(),
                    source,
                })?;

        let mut buf = self.pool.get();
        template
            .render_to_write(Value::from_serialize(ctx.stash()), &mut *buf)
            .map_err(|source| RenderError::Execute {
                name: template_name.to_string(),
                source,
            })?;

        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        res.write(&buf);
        Ok(())
    }
}
