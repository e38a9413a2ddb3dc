//! End-to-end transport scenarios against a mock gateway listening on a
//! real loopback TCP socket: the wire codec, the connector/conduit tasks,
//! and the request/reply matching all run for real.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use growlink::codec::{encode, FunctionCode, Header, Packet, Payload};
use growlink::net::transport::PortTransport;

const HEADER_SIZE: usize = 10;
const CRC16_SIZE: usize = 2;

fn sequence_number_of(request: &[u8]) -> u32 {
    u32::from_le_bytes([request[4], request[5], request[6], request[7]])
}

/// A single command/reply mock gateway: accepts one connection, reads
/// exactly `request_len` bytes of the expected command, and replies with
/// `build_reply`'s packet (sequence number filled in from the request).
async fn mock_gateway(
    listener: TcpListener,
    request_len: usize,
    build_reply: impl FnOnce(u32) -> Packet,
) {
    let (mut stream, _) = listener.accept().await.expect("accept");
    let mut request = vec![0u8; request_len];
    stream.read_exact(&mut request).await.expect("read command");
    let sequence_number = sequence_number_of(&request);
    let reply = build_reply(sequence_number);
    stream.write_all(&encode(&reply)).await.expect("write reply");
}

#[tokio::test]
async fn get_serial_number_round_trips_over_a_real_tcp_socket() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind mock gateway");
    let port = listener.local_addr().unwrap().port();

    let gateway = tokio::spawn(mock_gateway(listener, HEADER_SIZE + 1 + CRC16_SIZE, |sequence_number| Packet {
        header: Header { client_ipv4: [0, 0, 0, 0], sequence_number, short_address: 7, function_code: FunctionCode::GetSerialNumber.wire() },
        payload: Payload::ReplyGetSerialNumber { serial: 424242 },
    }));

    let transport = PortTransport::new(Ipv4Addr::LOCALHOST, port);
    transport.activate(false);

    let replies = transport
        .assemble_and_exchange(7, FunctionCode::GetSerialNumber, Payload::GetSerialNumber { random_backoff: true })
        .await
        .expect("exchange");

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].payload, Payload::ReplyGetSerialNumber { serial: 424242 });
    gateway.await.expect("mock gateway task");
}

#[tokio::test]
async fn set_short_address_reassociates_the_lookup_table_on_ack() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind mock gateway");
    let port = listener.local_addr().unwrap().port();

    // SetShortAddress command payload: 4-byte serial + 1-byte short address.
    let gateway = tokio::spawn(mock_gateway(listener, HEADER_SIZE + 5 + CRC16_SIZE, |sequence_number| Packet {
        header: Header {
            client_ipv4: [0, 0, 0, 0],
            sequence_number,
            short_address: 0,
            function_code: FunctionCode::SetShortAddress.wire(),
        },
        payload: Payload::Empty,
    }));

    let transport = PortTransport::new(Ipv4Addr::LOCALHOST, port);
    transport.activate(false);

    assert_eq!(transport.look_up(999), growlink::constants::SHORT_ADDRESS_UNASSIGNED);

    transport
        .assemble_and_exchange(
            growlink::constants::SHORT_ADDRESS_BROADCAST,
            FunctionCode::SetShortAddress,
            Payload::SetShortAddress { serial: 999, short_address: 5 },
        )
        .await
        .expect("exchange");

    assert_eq!(transport.look_up(999), 5);
    gateway.await.expect("mock gateway task");
}

#[tokio::test]
async fn a_fixture_that_never_replies_leaves_the_timeout_window_empty() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind mock gateway");
    let port = listener.local_addr().unwrap().port();

    let gateway = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let transport = PortTransport::new(Ipv4Addr::LOCALHOST, port);
    transport.activate(false);

    let replies = transport
        .assemble_and_exchange(3, FunctionCode::GetSerialNumber, Payload::GetSerialNumber { random_backoff: false })
        .await
        .expect("exchange does not error on silence, only check_replies does");

    assert!(replies.is_empty());
    gateway.abort();
}
