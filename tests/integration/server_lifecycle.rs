//! Serving on a real socket and draining on shutdown.

use std::time::Duration;

use relay_edge::serve;
use relay_edge::shutdown::ShutdownCoordinator;
use tokio::net::TcpListener;

use super::common::{AppOptions, TestApp};

#[tokio::test]
async fn test_serves_until_shutdown() {
    let app = TestApp::start(AppOptions::default()).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    let router = app.router.clone();
    coordinator.spawn("http-server", async move {
        serve(listener, router, signal).await.unwrap();
    });

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), r#"{"status":"ok"}"#);

    tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.shutdown(Duration::from_secs(2)),
    )
    .await
    .unwrap();

    assert!(reqwest::get(format!("http://{addr}/health")).await.is_err());
}

#[tokio::test]
async fn test_peer_address_is_the_default_throttle_key() {
    let app = TestApp::start(AppOptions {
        global_quotas: vec![relay_edge::rate_limiter::Quota::per_minute(1)],
        ..AppOptions::default()
    })
    .await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    let router = app.router.clone();
    coordinator.spawn("http-server", async move {
        serve(listener, router, signal).await.unwrap();
    });

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/health");
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 429);
    assert_eq!(
        client
            .get(&url)
            .header("x-api-key", "fresh")
            .send()
            .await
            .unwrap()
            .status(),
        200
    );

    coordinator.shutdown(Duration::from_secs(2)).await;
}
