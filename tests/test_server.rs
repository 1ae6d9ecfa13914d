//! TestServer harness integration tests.

mod common;

use server_bootstrap::{make_socket, AddressSpec, TestServer};

#[tokio::test]
async fn serves_then_releases_port_on_close() {
    let server = TestServer::start(common::hello_app()).await.unwrap();
    let port = server.port();

    let response = reqwest::get(format!("{}/", server.base_url())).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"Hello world!");

    server.close().await.unwrap();

    // The server is down: new connections are refused...
    let err = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);

    // ...and the port is immediately rebindable.
    let spec = AddressSpec::Tcp { host: "127.0.0.1".into(), port: Some(port) };
    make_socket(&spec, None).await.unwrap();
}

#[tokio::test]
async fn threaded_harness_serves_requests() {
    let server = TestServer::builder()
        .threaded(true)
        .start(common::hello_app())
        .await
        .unwrap();

    let body = common::raw_get(&server.host(), server.port()).await;
    assert_eq!(body, b"Hello world!");

    server.close().await.unwrap();
}

#[tokio::test]
async fn adhoc_tls_harness_serves_https() {
    let server = TestServer::builder()
        .adhoc_tls()
        .start(common::hello_app())
        .await
        .unwrap();
    assert!(server.tls_active());
    assert!(server.base_url().starts_with("https://"));

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();
    let response = client.get(format!("{}/", server.base_url())).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"Hello world!");

    server.close().await.unwrap();
}

#[tokio::test]
async fn close_reports_state_not_panic_on_drop_path() {
    // Dropping without close must not hang the runtime; the fallback
    // aborts the background task.
    let server = TestServer::start(common::hello_app()).await.unwrap();
    let handle = server.handle();
    drop(server);

    tokio::time::timeout(std::time::Duration::from_secs(1), handle.wait_stopped())
        .await
        .ok();
}
