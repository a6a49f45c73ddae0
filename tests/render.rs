//! End-to-end rendering tests over a real HTTP listener.

use std::time::Duration;

use stout::config::CONF_HTTP_BIND;
use stout::{Exchange, Server, View};
use tempfile::TempDir;

mod common;

fn server_with_templates(dir: &TempDir) -> Server {
    let mut server = Server::new("STOUT_RENDER_TEST");
    server.set_conf(CONF_HTTP_BIND, "127.0.0.1:0");
    server.set_template_dir(dir.path());
    server.set_timeout(Duration::from_secs(1));
    server
}

#[tokio::test]
async fn renders_view_against_stash() {
    let dir = TempDir::new().unwrap();
    common::write_template(dir.path(), "home", "<h1>{{ title }}</h1>");

    let mut server = server_with_templates(&dir);
    server.get(
        "/",
        |mut exchange: Exchange| async move {
            exchange.ctx.stash_insert("title", "hi");
            exchange
        },
        Some(View::named("home")),
    );
    let shutdown = server.shutdown_handle();
    let (addr, join) = common::spawn_http(server).await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/html; charset=utf-8"
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("<h1>hi</h1>"), "{body}");

    shutdown.trigger();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn route_params_reach_the_template() {
    let dir = TempDir::new().unwrap();
    common::write_template(dir.path(), "greet", "hello {{ name }}");

    let mut server = server_with_templates(&dir);
    server.get(
        "/greet/{name}",
        |mut exchange: Exchange| async move {
            let name = exchange.ctx.param("name").unwrap_or("?").to_string();
            exchange.ctx.stash_insert("name", name);
            exchange
        },
        Some(View::named("greet")),
    );
    let shutdown = server.shutdown_handle();
    let (addr, join) = common::spawn_http(server).await;

    let body = reqwest::get(format!("http://{addr}/greet/world"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "hello world");

    shutdown.trigger();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn structured_stash_values_render() {
    let dir = TempDir::new().unwrap();
    common::write_template(
        dir.path(),
        "profile",
        "{{ user.name }} wrote {{ user.posts[0].title }}",
    );

    let mut server = server_with_templates(&dir);
    server.get(
        "/profile",
        |mut exchange: Exchange| async move {
            exchange.ctx.stash_insert(
                "user",
                serde_json::json!({
                    "name": "maeve",
                    "posts": [{ "title": "on porter" }],
                }),
            );
            exchange
        },
        Some(View::named("profile")),
    );
    let shutdown = server.shutdown_handle();
    let (addr, join) = common::spawn_http(server).await;

    let body = reqwest::get(format!("http://{addr}/profile"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "maeve wrote on porter");

    shutdown.trigger();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn missing_view_yields_500() {
    let dir = TempDir::new().unwrap();

    let mut server = server_with_templates(&dir);
    server.get("/bare", |exchange: Exchange| async move { exchange }, None);
    let shutdown = server.shutdown_handle();
    let (addr, join) = common::spawn_http(server).await;

    let response = reqwest::get(format!("http://{addr}/bare")).await.unwrap();
    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.contains("No view defined for /bare"), "{body}");

    shutdown.trigger();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn default_view_applies_when_route_has_none() {
    let dir = TempDir::new().unwrap();
    common::write_template(dir.path(), "index", "default view wins");

    let mut server = server_with_templates(&dir);
    server.set_default_view(View::named("index"));
    server.get("/", |exchange: Exchange| async move { exchange }, None);
    let shutdown = server.shutdown_handle();
    let (addr, join) = common::spawn_http(server).await;

    let body = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "default view wins");

    shutdown.trigger();
    join.await.unwrap().unwrap();
}
