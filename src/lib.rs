//! stout: a minimal HTTP request-serving layer.
//!
//! Accepts inbound connections on one or two network endpoints, routes
//! requests to handler logic, carries per-request state through the request
//! lifecycle, renders an HTML template against that state, and shuts down
//! cleanly without dropping in-flight connections.
//!
//! # Architecture Overview
//!
//! ```text
//!   inbound connection
//!         │
//!         ▼
//!   ┌──────────────┐   ┌──────────┐   ┌────────────────┐
//!   │   server     │──▶│  router  │──▶│ RequestContext │
//!   │ (HTTP/HTTPS) │   │ adapter  │   │  construction  │
//!   └──────────────┘   └──────────┘   └───────┬────────┘
//!                                             │
//!                                             ▼
//!                                      ┌─────────────┐
//!                                      │   handler   │
//!                                      └──────┬──────┘
//!                                             │
//!                                             ▼
//!   ┌──────────────┐   ┌──────────┐   ┌─────────────┐
//!   │   response   │◀──│ renderer │◀──│  template   │
//!   │   tracker    │   │          │   │   cache     │
//!   └──────────────┘   └──────────┘   └─────────────┘
//! ```
//!
//! Shutdown control flow: an external stop signal tells every active
//! listener to stop accepting and drain in-flight requests within a bounded
//! timeout; in dual-bind mode neither listener outlives the other.

pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod render;
pub mod response;
pub mod router;
pub mod server;
pub mod view;

pub use config::Conf;
pub use context::{RemoteAddr, RequestContext};
pub use error::{ClientIpError, ConfigError, RenderError, ServeError, TemplateError};
pub use response::ResponseTracker;
pub use router::{Exchange, Handler};
pub use server::{FcgiTransport, Server};
pub use view::View;
