//! Shared helpers for integration tests.

use std::net::SocketAddr;
use std::path::Path;

use stout::{ServeError, Server};

/// Write a template file, creating the directory as needed.
#[allow(dead_code)]
pub fn write_template(dir: &Path, name: &str, contents: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Spawn a server and wait until its HTTP listener reports an address.
#[allow(dead_code)]
pub async fn spawn_http(
    server: Server,
) -> (SocketAddr, tokio::task::JoinHandle<Result<(), ServeError>>) {
    let handle = server.http_handle();
    let join = tokio::spawn(server.run());
    let addr = handle
        .listening()
        .await
        .expect("HTTP listener never came up");
    (addr, join)
}
