//! Client facade against an in-process relay.

use std::sync::Arc;
use std::time::Duration;

use overlay_relay_client::prelude::*;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const SEED: &str = "0707070707070707070707070707070707070707070707070707070707070707";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_with(policy: ReconnectPolicy) -> (OverlayClient, MemoryRelay) {
    init_tracing();
    let (connector, relay) = MemoryConnector::pair();
    let config = ClientConfig::builder()
        .identifier("alice")
        .seed(SEED)
        .call_timeout(Duration::from_secs(2))
        .connect_timeout(Duration::from_secs(1))
        .reconnect(policy)
        .build();
    let client = OverlayClient::with_parts(
        config,
        Arc::new(connector),
        Arc::new(StaticResolver::new("relay:30002")),
    )
    .unwrap();
    (client, relay)
}

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn packet_push(src: &str, payload: &str) -> Envelope {
    Envelope::new(
        "receivePacket",
        fields(json!({ "Src": src, "Payload": payload, "Digest": "digest" })),
    )
}

/// Acknowledge every request on `peer`, forwarding each one to the test.
fn acknowledge_all(mut peer: MemoryPeer) -> mpsc::UnboundedReceiver<Envelope> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(request) = peer.recv_envelope().await {
            if tx.send(request.clone()).is_err() || peer.reply_ok(&request, json!("result")).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::test]
async fn test_packets_are_received_in_arrival_order() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);
    client.connect().await.unwrap();
    let peer = relay.accept().await.unwrap();

    for payload in ["first", "second", "third"] {
        peer.push(&packet_push("bob.b0b", payload)).unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        let packet = client.recv().await;
        assert_eq!(packet.source(), Some("bob.b0b"));
        assert_eq!(packet.digest(), Some("digest"));
        received.push(packet.payload().to_owned());
    }
    assert_eq!(received, ["first", "second", "third"]);
    assert!(client.try_recv().is_none());
}

#[tokio::test]
async fn test_send_produces_exactly_one_signed_packet() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);
    client.connect().await.unwrap();
    let mut requests = acknowledge_all(relay.accept().await.unwrap());

    client.send("bob.PUBKEY", "hello").await.unwrap();

    let request = requests.recv().await.unwrap();
    assert_eq!(request.tag(), "sendPacket");
    assert_eq!(request.str_field("Dest"), Some("bob.PUBKEY"));
    assert_eq!(request.str_field("Payload"), Some("hello"));
    assert_eq!(
        request.str_field("Signature"),
        Some(KeyPair::from_hex_seed(SEED).unwrap().sign_hex(b"hello").as_str())
    );
    assert!(requests.try_recv().is_err());
}

#[tokio::test]
async fn test_block_hash_push_does_not_disturb_pending_call() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);
    client.connect().await.unwrap();
    let mut peer = relay.accept().await.unwrap();

    let (sent, ()) = tokio::join!(client.send("bob.PUBKEY", "hello"), async {
        let request = peer.recv_envelope().await.unwrap();
        peer.push(&Envelope::new(
            "updateSigChainBlockHash",
            fields(json!({ "Result": "HASH" })),
        ))
        .unwrap();
        peer.reply(&request, 0, "SUCCESS", json!("result")).unwrap();
    });

    sent.unwrap();
    assert_eq!(client.latest_block_hash().as_deref(), Some("HASH"));
    assert_eq!(client.api().correlator().pending_calls(), 0);
}

#[tokio::test]
async fn test_typed_operations_through_the_facade() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);
    client.connect().await.unwrap();
    let mut peer = relay.accept().await.unwrap();

    let (height, ()) = tokio::join!(client.api().get_latest_block_height(), async {
        let request = peer.recv_envelope().await.unwrap();
        // Relays that do not echo the id.
        peer.send(r#"{"Action":"getlatestblockheight","Desc":"SUCCESS","Error":0,"Result":660,"Version":"1.0.0"}"#)
            .unwrap();
        assert_eq!(request.tag(), "getlatestblockheight");
    });
    assert_eq!(height.unwrap(), 660);

    let address = client.address().to_string();
    let (registered, ()) = tokio::join!(client.api().set_client(&address), async {
        let request = peer.recv_envelope().await.unwrap();
        assert_eq!(request.str_field("Addr"), Some(address.as_str()));
        peer.reply(&request, 0, "SUCCESS", Value::Null).unwrap();
    });
    registered.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sends_share_one_stream() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);
    let client = Arc::new(client);
    client.connect().await.unwrap();
    let mut requests = acknowledge_all(relay.accept().await.unwrap());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            client.send("bob.PUBKEY", &format!("message {i}")).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut payloads = Vec::new();
    while let Ok(request) = requests.try_recv() {
        payloads.push(request.str_field("Payload").unwrap().to_owned());
    }
    payloads.sort();
    let mut expected: Vec<String> = (0..16).map(|i| format!("message {i}")).collect();
    expected.sort();
    assert_eq!(payloads, expected);

    assert_eq!(client.api().correlator().pending_calls(), 0);
    assert_eq!(relay.peak_streams(), 1);
}

#[tokio::test]
async fn test_reconnects_after_relay_drops_stream() {
    let (client, mut relay) = client_with(ReconnectPolicy::Forever {
        min_interval: Duration::from_millis(5),
    });
    client.connect().await.unwrap();
    let first = relay.accept().await.unwrap();
    first.push(&packet_push("bob.b0b", "before")).unwrap();
    first.close();

    let mut requests = acknowledge_all(relay.accept().await.unwrap());
    client
        .subscribe_state()
        .wait_for(|state| state.is_connected())
        .await
        .unwrap();

    client.send("bob.PUBKEY", "after").await.unwrap();
    assert_eq!(
        requests.recv().await.unwrap().str_field("Payload"),
        Some("after")
    );
    assert_eq!(client.recv().await.payload(), "before");

    assert_eq!(relay.opened_streams(), 2);
    assert_eq!(relay.peak_streams(), 1);

    client.disconnect().await;
    assert_eq!(relay.live_streams(), 0);
}

#[tokio::test]
async fn test_connect_disconnect_cycles_keep_one_stream() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);

    for _ in 0..3 {
        client.connect().await.unwrap();
        client.connect().await.unwrap();
        let _peer = relay.accept().await.unwrap();
        assert_eq!(relay.live_streams(), 1);

        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.session_state(), SessionState::Disconnected);
        assert_eq!(relay.live_streams(), 0);
    }

    assert_eq!(relay.opened_streams(), 3);
    assert_eq!(relay.peak_streams(), 1);
}

#[tokio::test]
async fn test_queued_packets_survive_disconnect() {
    let (client, mut relay) = client_with(ReconnectPolicy::Never);
    client.connect().await.unwrap();
    let peer = relay.accept().await.unwrap();

    peer.push(&packet_push("bob.b0b", "kept")).unwrap();
    // A round trip after the push marks it as processed.
    let (_, ()) = tokio::join!(client.api().heartbeat(), async {
        let mut peer = peer;
        let request = peer.recv_envelope().await.unwrap();
        peer.reply_ok(&request, json!("alive")).unwrap();
    });

    client.disconnect().await;
    assert_eq!(client.try_recv().map(|p| p.payload().to_owned()).as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_send_times_out_without_residue() {
    let (connector, mut relay) = MemoryConnector::pair();
    let config = ClientConfig::builder()
        .identifier("alice")
        .call_timeout(Duration::from_millis(50))
        .reconnect(ReconnectPolicy::Never)
        .build();
    let client = OverlayClient::with_parts(
        config,
        Arc::new(connector),
        Arc::new(StaticResolver::new("relay:30002")),
    )
    .unwrap();
    client.connect().await.unwrap();
    let _silent = relay.accept().await.unwrap();

    let err = client.send("bob.PUBKEY", "hello").await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc(RpcError::Timeout { .. })));
    assert!(err.is_retryable());
    assert_eq!(client.api().correlator().pending_calls(), 0);
}
