//! TCP transport over the loopback interface

use assert_matches::assert_matches;
use spacetime_core::{Connection, ConnectionType, Listener, NetworkProvider, TransportError};
use spacetime_transport::{TokioNetworkProvider, TransportConfig};
use std::sync::Arc;

#[tokio::test]
async fn connect_accept_and_exchange_bytes() {
    let provider = TokioNetworkProvider::default();
    let listener = provider.bind_tcp("127.0.0.1", 0).await.unwrap();
    let port = listener.local_addr().port();

    let (client, server) = tokio::join!(
        provider.connect("127.0.0.1", port, ConnectionType::Tcp),
        listener.accept()
    );
    let client = client.unwrap();
    let server = server.unwrap();

    client.write(b"hello").await.unwrap();
    assert_eq!(server.read(5).await.unwrap(), b"hello".to_vec());

    server.write_with_length_prefix(b"framed reply", 32).await.unwrap();
    assert_eq!(
        client.read_with_length_prefix(32).await.unwrap(),
        b"framed reply".to_vec()
    );

    client.close().await;
    assert_matches!(server.read_max(8).await, Err(TransportError::Closed));
    assert_matches!(client.write(b"late").await, Err(TransportError::Closed));
}

#[tokio::test]
async fn binding_a_taken_port_reports_address_in_use() {
    let provider = TokioNetworkProvider::default();
    let first = provider.bind_tcp("127.0.0.1", 0).await.unwrap();
    let port = first.local_addr().port();
    assert_matches!(
        provider.listen("127.0.0.1", port, ConnectionType::Tcp).await,
        Err(TransportError::AddressInUse(_))
    );
}

#[tokio::test]
async fn closed_listener_stops_accepting() {
    let provider = TokioNetworkProvider::new(TransportConfig::default());
    let listener = Arc::new(provider.bind_tcp("127.0.0.1", 0).await.unwrap());
    let pending = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.accept().await })
    };
    tokio::task::yield_now().await;
    listener.close().await;
    assert_matches!(pending.await.unwrap(), Err(TransportError::Closed));
    assert_matches!(listener.accept().await, Err(TransportError::Closed));
}

#[tokio::test]
async fn udp_listen_is_unsupported() {
    let provider = TokioNetworkProvider::default();
    assert_matches!(
        provider.listen("127.0.0.1", 0, ConnectionType::Udp).await,
        Err(TransportError::Unsupported(_))
    );
}
