//! stout demo server.
//!
//! Reads configuration under the `STOUT` env prefix, registers a single
//! view-backed route, and serves until a stop signal arrives. Startup
//! failures exit non-zero.

use stout::config::CONF_TEMPLATE_DIR;
use stout::{Exchange, Server, View};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stout=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut server = Server::new("STOUT");
    let template_dir = server.conf().get(CONF_TEMPLATE_DIR);
    if !template_dir.is_empty() {
        server.set_template_dir(template_dir);
    }
    server.set_default_view(View::named("index"));
    server.get(
        "/",
        |mut exchange: Exchange| async move {
            exchange.ctx.stash_insert("title", "stout");
            exchange
        },
        None,
    );

    tracing::info!("stout starting");
    if let Err(err) = server.run().await {
        tracing::error!(error = %err, "server failed");
        std::process::exit(1);
    }
    tracing::info!("shutdown complete");
}
