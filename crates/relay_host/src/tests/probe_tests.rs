use super::*;
use axum::{http::header::CONTENT_TYPE, routing::get, Router};
use tokio::net::TcpListener;

async fn serve(router: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    port
}

async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr").port()
}

fn probe(port: u16) -> HealthProbe {
    HealthProbe::new(port, Duration::from_secs(2))
}

#[tokio::test]
async fn closed_port_is_neither_accessible_nor_online() {
    let port = unused_port().await;
    let health = probe(port).check().await;
    assert!(!health.port_accessible);
    assert!(!health.relay_online);
    assert!(health.message.contains(&port.to_string()));
}

#[tokio::test]
async fn relay_information_document_marks_relay_online() {
    let router = Router::new().route(
        "/",
        get(|| async {
            (
                [(CONTENT_TYPE, NIP11_MEDIA_TYPE)],
                r#"{"name":"Test Relay","software":"nostr-rs-relay","supported_nips":[1,11]}"#,
            )
        }),
    );
    let port = serve(router).await;

    let probe = probe(port);
    let info = probe.relay_info().await.expect("relay info");
    assert_eq!(info.name.as_deref(), Some("Test Relay"));
    assert_eq!(info.supported_nips, vec![1, 11]);

    let health = probe.check().await;
    assert!(health.port_accessible);
    assert!(health.relay_online);
    assert!(health.message.starts_with("Test Relay"));
}

#[tokio::test]
async fn other_service_on_port_reads_as_occupied() {
    let router = Router::new().route("/", get(|| async { "<html>not a relay</html>" }));
    let port = serve(router).await;

    let health = probe(port).check().await;
    assert!(health.port_accessible);
    assert!(!health.relay_online);
    assert!(health.port_occupied());
}

#[tokio::test]
async fn raw_tcp_listener_is_accessible_but_not_a_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let health = probe(port).check().await;
    assert!(health.port_accessible);
    assert!(!health.relay_online);
}
