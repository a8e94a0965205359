use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use pulse::net::{
    NetworkEndpoint, PacketBuffer, PacketHeader, PacketType, PlayerInput, HEADER_SIZE,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(40000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

fn wait_for_packet(
    endpoint: &mut NetworkEndpoint,
    timeout_ms: u64,
) -> Option<Vec<(PacketHeader, PacketBuffer, SocketAddr)>> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        let received = endpoint.receive().unwrap();
        if !received.is_empty() {
            return Some(received);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn test_socket_lifecycle() {
    let endpoint = NetworkEndpoint::bind("0.0.0.0:17777").unwrap();
    assert_eq!(endpoint.local_addr().port(), 17777);
    drop(endpoint);

    // port is reusable after drop
    let again = NetworkEndpoint::bind("0.0.0.0:17777").unwrap();
    assert_eq!(again.local_addr().port(), 17777);
}

#[test]
fn test_loopback_delivery() {
    let server_port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", server_port).parse().unwrap();

    let mut server = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

    let mut header = PacketHeader::new(PacketType::Heartbeat);
    header.sequence = 9;
    header.tick = 77;

    let mut buffer = PacketBuffer::new();
    buffer.write_header(&header);
    client.send_to(&buffer, server_addr).unwrap();

    let received = wait_for_packet(&mut server, 200).expect("no packet received");
    assert_eq!(received.len(), 1);

    let (decoded, _, from_addr) = &received[0];
    assert_eq!(decoded.sequence, 9);
    assert_eq!(decoded.tick, 77);
    assert_eq!(decoded.packet_type(), Some(PacketType::Heartbeat));
    assert_eq!(from_addr.port(), client.local_addr().port());
}

#[test]
fn test_payload_survives_transit() {
    let server_port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", server_port).parse().unwrap();

    let mut server = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

    let input = PlayerInput {
        sequence: 12,
        tick: 300,
        keys: PlayerInput::KEY_FORWARD | PlayerInput::KEY_UP,
        yaw: -90.0,
        pitch: 15.0,
        delta_time: 0.016,
    };

    let mut header = PacketHeader::new(PacketType::Input);
    let mut buffer = PacketBuffer::new();
    let header_pos = buffer.begin_packet();
    buffer.write_player_input(&input);
    buffer.end_packet(header_pos, &mut header);
    client.send_to(&buffer, server_addr).unwrap();

    let mut received = wait_for_packet(&mut server, 200).expect("no packet received");
    let (decoded_header, decoded_buffer, _) = &mut received[0];

    assert_eq!(decoded_header.packet_type(), Some(PacketType::Input));
    assert_eq!(decoded_header.payload_size as usize, 21);
    assert_eq!(decoded_buffer.read_player_input(), input);
}

#[test]
fn test_invalid_magic_dropped() {
    let server_port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", server_port).parse().unwrap();

    let mut server = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

    let mut buffer = PacketBuffer::new();
    buffer.write_header(&PacketHeader::new(PacketType::Heartbeat));
    buffer.data[0] = b'X';
    client.send_to(&buffer, server_addr).unwrap();

    assert!(wait_for_packet(&mut server, 100).is_none());
}

#[test]
fn test_runt_datagram_dropped() {
    let server_port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", server_port).parse().unwrap();

    let mut server = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

    let mut buffer = PacketBuffer::new();
    buffer.write_bytes(b"PULS");
    assert!(buffer.write_pos < HEADER_SIZE);
    client.send_to(&buffer, server_addr).unwrap();

    assert!(wait_for_packet(&mut server, 100).is_none());
}

#[test]
fn test_truncated_payload_dropped() {
    let server_port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", server_port).parse().unwrap();

    let mut server = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client = NetworkEndpoint::bind("127.0.0.1:0").unwrap();

    // claims 64 payload bytes, carries none
    let mut header = PacketHeader::new(PacketType::Input);
    header.payload_size = 64;
    let mut buffer = PacketBuffer::new();
    buffer.write_header(&header);
    client.send_to(&buffer, server_addr).unwrap();

    assert!(wait_for_packet(&mut server, 100).is_none());
}
