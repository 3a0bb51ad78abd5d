use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use framekv_client::Client;
use framekv_proto::{
    encode_message, Message, MessageHeader, MetricsCommand, Response, HEADER_SIZE,
};
use framekv_server::config::Config;
use framekv_server::server::{Server, ServerContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start_server() -> (SocketAddr, Arc<ServerContext>) {
    let cfg = Config {
        port: 0,
        ..Config::default()
    };
    let server = Server::bind(cfg).await.unwrap();
    let addr = server.local_addr().unwrap();
    let ctx = server.context();
    tokio::spawn(server.serve());
    (addr, ctx)
}

fn client(addr: SocketAddr) -> Client {
    Client::new(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn set_get_metrics_over_tcp() {
    let (addr, ctx) = start_server().await;
    let mut client = client(addr);

    let keys = client
        .set(vec![("a".to_string(), Bytes::from_static(b"1"))])
        .await
        .unwrap();
    assert_eq!(keys, vec!["a".to_string()]);

    let found = client.get(vec!["a".to_string()]).await.unwrap();
    assert_eq!(found.get("a"), Some(&Bytes::from_static(b"1")));

    let report = client.metrics(MetricsCommand::all()).await.unwrap();
    assert_eq!(report.key_count, Some(1));
    assert_eq!(report.total_store_contents_size, Some(1));
    assert_eq!(report.keys_updated_count, Some(1));
    assert_eq!(report.keys_read_count, Some(1));
    assert_eq!(report.keys_deleted_count, None);

    ctx.terminate();
}

#[tokio::test]
async fn overwrite_and_delete_accounting() {
    let (addr, ctx) = start_server().await;
    let mut client = client(addr);

    client
        .set(vec![("k".to_string(), Bytes::from_static(b"hello"))])
        .await
        .unwrap();
    client
        .set(vec![("k".to_string(), Bytes::from_static(b"hi"))])
        .await
        .unwrap();
    let report = client.metrics(MetricsCommand::all()).await.unwrap();
    assert_eq!(report.total_store_contents_size, Some(2));
    assert_eq!(report.keys_updated_count, Some(2));

    client
        .set(vec![
            ("x".to_string(), Bytes::from_static(b"AAA")),
            ("y".to_string(), Bytes::from_static(b"BB")),
        ])
        .await
        .unwrap();
    let removed = client
        .delete(vec!["x".to_string(), "z".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, vec!["x".to_string()]);

    let found = client
        .get(vec!["x".to_string(), "y".to_string(), "k".to_string()])
        .await
        .unwrap();
    assert!(!found.contains_key("x"));
    assert_eq!(found.get("y"), Some(&Bytes::from_static(b"BB")));
    assert_eq!(found.get("k"), Some(&Bytes::from_static(b"hi")));

    ctx.terminate();
}

#[tokio::test]
async fn get_of_absent_key_is_ok_and_counted() {
    let (addr, ctx) = start_server().await;
    let mut client = client(addr);

    let found = client.get(vec!["missing".to_string()]).await.unwrap();
    assert!(found.is_empty());

    let report = client.metrics(MetricsCommand::all()).await.unwrap();
    assert_eq!(report.keys_read_count, Some(1));
    assert_eq!(report.key_count, Some(0));

    ctx.terminate();
}

#[tokio::test]
async fn concurrent_readers_and_one_writer() {
    let (addr, ctx) = start_server().await;

    let mut setup = client(addr);
    setup
        .set(vec![("k".to_string(), Bytes::from_static(b"before"))])
        .await
        .unwrap();

    let writer = tokio::spawn(async move {
        let mut writer = client(addr);
        writer
            .set(vec![("k".to_string(), Bytes::from_static(b"after"))])
            .await
            .unwrap();
    });

    let readers: Vec<_> = (0..10)
        .map(|_| {
            tokio::spawn(async move {
                let mut reader = client(addr);
                reader.get(vec!["k".to_string()]).await.unwrap()
            })
        })
        .collect();

    for reader in readers {
        let found = reader.await.unwrap();
        let value = found.get("k").unwrap();
        // Values are never torn: either the old or the new bytes, whole.
        assert!(
            value == &Bytes::from_static(b"before") || value == &Bytes::from_static(b"after"),
            "unexpected value {value:?}"
        );
    }
    writer.await.unwrap();

    // A read issued after the write completed must see the new value.
    let found = setup.get(vec!["k".to_string()]).await.unwrap();
    assert_eq!(found.get("k"), Some(&Bytes::from_static(b"after")));

    ctx.terminate();
}

#[tokio::test]
async fn execution_error_keeps_the_connection_usable() {
    let (addr, ctx) = start_server().await;

    // A response-typed message is a valid frame but not an executable
    // command; the server must answer with an error and keep reading.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let (header_bytes, body) = encode_message(&Message::Response(Response::ok(None)));
    stream.write_all(&header_bytes).await.unwrap();
    stream.write_all(&body).await.unwrap();

    let mut header_bytes = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header_bytes).await.unwrap();
    let header = MessageHeader::decode(&header_bytes).unwrap();
    let mut payload = vec![0u8; header.message_size as usize];
    stream.read_exact(&mut payload).await.unwrap();
    let reply = framekv_proto::decode_message(header.message_type, &payload).unwrap();
    match reply {
        Message::Response(response) => {
            assert_eq!(response.status, framekv_proto::Status::Error)
        }
        other => panic!("expected response, got {other:?}"),
    }

    // Same connection, now a well-formed command.
    let (header_bytes, body) = encode_message(&Message::Get(framekv_proto::GetCommand {
        keys: vec!["k".to_string()],
    }));
    stream.write_all(&header_bytes).await.unwrap();
    stream.write_all(&body).await.unwrap();
    let mut header_bytes = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header_bytes).await.unwrap();

    ctx.terminate();
}

#[tokio::test]
async fn malformed_payload_closes_the_connection() {
    let (addr, ctx) = start_server().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // A GET frame whose payload claims one key but carries garbage.
    let header = MessageHeader {
        message_type: framekv_proto::MessageType::Get,
        message_size: 4,
    };
    stream.write_all(&header.encode()).await.unwrap();
    stream.write_all(&[0xff, 0xff, 0xff, 0xff]).await.unwrap();

    // The server drops the connection instead of answering.
    let mut buf = [0u8; 1];
    let read = stream.read(&mut buf).await.unwrap();
    assert_eq!(read, 0);

    ctx.terminate();
}

#[tokio::test]
async fn termination_stops_the_accept_loop() {
    let cfg = Config {
        port: 0,
        ..Config::default()
    };
    let server = Server::bind(cfg).await.unwrap();
    let ctx = server.context();
    let handle = tokio::spawn(server.serve());

    ctx.terminate();
    handle.await.unwrap().unwrap();
}
