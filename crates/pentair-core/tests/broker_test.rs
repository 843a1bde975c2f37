#![allow(clippy::unwrap_used)]
// `BrokerConnection` against a minimal in-process MQTT 3.1.1 peer.
//
// The fake broker speaks just enough of the protocol for one client:
// CONNECT/CONNACK, SUBSCRIBE/SUBACK, QoS 0 PUBLISH and DISCONNECT.

use std::net::SocketAddr;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;

use pentair_core::{BrokerConfig, BrokerConnection, CoreError, Publisher};

const ACCEPTED: u8 = 0x00;
const NOT_AUTHORIZED: u8 = 0x05;

// ── Fake broker ─────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum BrokerEvent {
    Connected { client_id: String, keep_alive: u16 },
    Subscribed(String),
    Published { topic: String, payload: Vec<u8> },
    Disconnected,
}

struct FakeBroker {
    addr: SocketAddr,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl FakeBroker {
    async fn start(connack_code: u8) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let replies = outbound.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();

            tokio::spawn(async move {
                while let Some(bytes) = outbound_rx.recv().await {
                    if writer.write_all(&bytes).await.is_err() {
                        break;
                    }
                }
            });

            while let Some((header, body)) = read_packet(&mut reader).await {
                match header >> 4 {
                    1 => {
                        let keep_alive = u16::from_be_bytes([body[8], body[9]]);
                        let client_id = read_string(&body[10..]);
                        replies.send(vec![0x20, 0x02, 0x00, connack_code]).unwrap();
                        events_tx
                            .send(BrokerEvent::Connected { client_id, keep_alive })
                            .unwrap();
                    }
                    8 => {
                        let topic = read_string(&body[2..]);
                        replies.send(vec![0x90, 0x03, body[0], body[1], 0x01]).unwrap();
                        events_tx.send(BrokerEvent::Subscribed(topic)).unwrap();
                    }
                    3 => {
                        let topic = read_string(&body);
                        let payload = body[2 + topic.len()..].to_vec();
                        events_tx
                            .send(BrokerEvent::Published { topic, payload })
                            .unwrap();
                    }
                    12 => replies.send(vec![0xD0, 0x00]).unwrap(),
                    14 => {
                        events_tx.send(BrokerEvent::Disconnected).unwrap();
                        break;
                    }
                    _ => {}
                }
            }
        });

        Self {
            addr,
            events,
            outbound,
        }
    }

    fn config(&self) -> BrokerConfig {
        let mut config = BrokerConfig::new(
            "127.0.0.1",
            self.addr.port(),
            "mqtt-user",
            "mqtt-pass".to_string().into(),
        );
        config.connect_timeout = Duration::from_secs(5);
        config.reconnect_delay = Duration::from_millis(100);
        config
    }

    /// Push a QoS 0 PUBLISH to the client.
    fn publish(&self, topic: &str, payload: &str) {
        let topic_len = u16::try_from(topic.len()).unwrap();
        let remaining = u8::try_from(2 + topic.len() + payload.len()).unwrap();
        let mut packet = vec![0x30, remaining];
        packet.extend_from_slice(&topic_len.to_be_bytes());
        packet.extend_from_slice(topic.as_bytes());
        packet.extend_from_slice(payload.as_bytes());
        self.outbound.send(packet).unwrap();
    }

    async fn next_event(&mut self) -> BrokerEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("broker event timed out")
            .expect("broker task ended")
    }
}

async fn read_packet(reader: &mut OwnedReadHalf) -> Option<(u8, Vec<u8>)> {
    let header = reader.read_u8().await.ok()?;

    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8().await.ok()?;
        remaining |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; remaining];
    reader.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn read_string(bytes: &[u8]) -> String {
    let len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    String::from_utf8(bytes[2..2 + len].to_vec()).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_subscribes_to_status_topic() {
    let mut broker = FakeBroker::start(ACCEPTED).await;

    let connection = BrokerConnection::connect(&broker.config()).await.unwrap();

    assert_eq!(
        broker.next_event().await,
        BrokerEvent::Connected {
            client_id: "pentairhome".into(),
            keep_alive: 30,
        }
    );
    assert_eq!(
        broker.next_event().await,
        BrokerEvent::Subscribed("homeassistant/status".into())
    );
    assert!(!connection.is_closed());

    connection.disconnect().await;
}

#[tokio::test]
async fn test_publish_reaches_broker() {
    let mut broker = FakeBroker::start(ACCEPTED).await;
    let connection = BrokerConnection::connect(&broker.config()).await.unwrap();
    broker.next_event().await;
    broker.next_event().await;

    connection
        .publish("pentairhome/abc123", br#"{"power":1.0}"#.to_vec())
        .await
        .unwrap();

    assert_eq!(
        broker.next_event().await,
        BrokerEvent::Published {
            topic: "pentairhome/abc123".into(),
            payload: br#"{"power":1.0}"#.to_vec(),
        }
    );

    connection.disconnect().await;
}

#[tokio::test]
async fn test_status_messages_are_broadcast() {
    let mut broker = FakeBroker::start(ACCEPTED).await;
    let connection = BrokerConnection::connect(&broker.config()).await.unwrap();
    broker.next_event().await;
    broker.next_event().await;

    let mut status = connection.status_messages();
    broker.publish("homeassistant/status", "online");

    let message = tokio::time::timeout(Duration::from_secs(5), status.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message, "online");

    connection.disconnect().await;
}

#[tokio::test]
async fn test_disabled_status_topic_skips_subscription() {
    let mut broker = FakeBroker::start(ACCEPTED).await;
    let mut config = broker.config();
    config.status_topic = None;

    let connection = BrokerConnection::connect(&config).await.unwrap();
    broker.next_event().await;
    connection
        .publish("pentairhome/abc123", b"{}".to_vec())
        .await
        .unwrap();

    // the first thing after CONNECT is our publish, not a SUBSCRIBE
    assert!(matches!(
        broker.next_event().await,
        BrokerEvent::Published { .. }
    ));

    connection.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let mut broker = FakeBroker::start(ACCEPTED).await;
    let connection = BrokerConnection::connect(&broker.config()).await.unwrap();
    broker.next_event().await;
    broker.next_event().await;

    connection.disconnect().await;

    assert!(connection.is_closed());
    assert_eq!(broker.next_event().await, BrokerEvent::Disconnected);
    tokio::time::timeout(Duration::from_secs(1), connection.closed())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refused_credentials_fail_connect() {
    let broker = FakeBroker::start(NOT_AUTHORIZED).await;

    let result = BrokerConnection::connect(&broker.config()).await;

    match result {
        Err(CoreError::BrokerConnect { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", broker.addr.port()));
        }
        Err(other) => panic!("expected BrokerConnect, got: {other:?}"),
        Ok(_) => panic!("expected BrokerConnect, got a connection"),
    }
}

#[tokio::test]
async fn test_unreachable_broker_fails_connect() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = BrokerConfig::new("127.0.0.1", port, "u", "p".to_string().into());

    let result = BrokerConnection::connect(&config).await;

    assert!(matches!(result, Err(CoreError::BrokerConnect { .. })));
}

#[tokio::test]
async fn test_empty_client_id_is_rejected() {
    let mut config = BrokerConfig::new("127.0.0.1", 1883, "u", "p".to_string().into());
    config.client_id = "  ".into();

    let result = BrokerConnection::connect(&config).await;

    assert!(matches!(
        result,
        Err(CoreError::BrokerConnect { reason, .. }) if reason.contains("client id")
    ));
}
