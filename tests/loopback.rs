//! Real socket integration tests.
//!
//! These tests bind a `DnsServer` on `127.0.0.1:0` and send real UDP and TCP
//! DNS queries to it.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::*;
use fixture_dns::{DnsError, DnsServer, DnsState, Zone};

// =========================================================================
// Infrastructure
// =========================================================================

/// A DNS server running on a random loopback port.
struct TestServer {
    udp: SocketAddr,
    tcp: Option<SocketAddr>,
    state: DnsState,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), DnsError>>,
}

impl TestServer {
    async fn start(zone: Zone) -> Self {
        let server = DnsServer::new(test_dns_config(), zone)
            .bind()
            .await
            .expect("failed to bind test server");
        let udp = server.local_addr();
        let tcp = server.tcp_addr();
        let state = server.state().clone();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(shutdown.clone()));

        Self {
            udp,
            tcp,
            state,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Send a DNS query over UDP and return the parsed response.
async fn query_udp(server: SocketAddr, name: &str, record_type: RecordType, id: u16) -> Message {
    let sock = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind client socket");

    let query_bytes = build_query_bytes(name, record_type, id);
    sock.send_to(&query_bytes, server)
        .await
        .expect("failed to send query");

    let mut buf = vec![0u8; 4096];
    let len = tokio::time::timeout(Duration::from_secs(5), sock.recv(&mut buf))
        .await
        .expect("query timed out")
        .expect("failed to recv response");

    Message::from_vec(&buf[..len]).expect("failed to parse DNS response")
}

/// Send a length-prefixed DNS query over TCP and return the parsed response.
async fn query_tcp(server: SocketAddr, name: &str, record_type: RecordType, id: u16) -> Message {
    let mut stream = TcpStream::connect(server)
        .await
        .expect("failed to connect");

    let query_bytes = build_query_bytes(name, record_type, id);
    stream
        .write_all(&(query_bytes.len() as u16).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&query_bytes).await.unwrap();

    let read = async {
        let len = stream.read_u16().await? as usize;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;
        Ok::<_, std::io::Error>(buf)
    };
    let buf = tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("query timed out")
        .expect("failed to read response");

    Message::from_vec(&buf).expect("failed to parse DNS response")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn loopback_udp_answers() {
    let server = TestServer::start(Zone::from_groups(&standard_groups())).await;

    let msg = query_udp(server.udp, "ipv4-multi-target.grpc.com.", RecordType::A, 1).await;
    assert_eq!(msg.id(), 1);
    assert_a_response(&msg, &["1.2.3.5", "1.2.3.6", "1.2.3.7"]);

    let msg = query_udp(
        server.udp,
        "_grpclb._tcp.srv-ipv6-single-target.grpc.com.",
        RecordType::SRV,
        2,
    )
    .await;
    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(
        extract_srv(&msg),
        [(0, 0, SRV_PORT, "ipv6-single-target.grpc.com.".to_string())]
    );

    let msg = query_udp(server.udp, "missing.grpc.com.", RecordType::A, 3).await;
    assert_response_code(&msg, ResponseCode::NXDomain);

    server.stop().await;
}

#[tokio::test]
async fn loopback_tcp_shares_udp_port() {
    let server = TestServer::start(Zone::from_groups(&standard_groups())).await;
    let tcp = server.tcp.expect("tcp enabled by default");
    assert_eq!(tcp, server.udp);

    let msg = query_tcp(tcp, "ipv4-simple-service-config.grpc.com.", RecordType::TXT, 4).await;
    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(extract_txt(&msg).len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn loopback_zone_swap_visible_to_clients() {
    let server = TestServer::start(Zone::new()).await;

    let msg = query_udp(server.udp, "ipv4-single-target.grpc.com.", RecordType::A, 5).await;
    assert_response_code(&msg, ResponseCode::NXDomain);

    server.state.replace(Zone::from_groups(&standard_groups()));

    let msg = query_udp(server.udp, "ipv4-single-target.grpc.com.", RecordType::A, 6).await;
    assert_a_response(&msg, &["1.2.3.4"]);

    server.stop().await;
}
