//! SOCKS5 dialer against an in-process SOCKS5 server

use cow_core::dialer::{DirectDialer, Socks5Dialer};
use cow_core::{Dialer, PerHost};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the test server saw in the CONNECT request
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Domain(String, u16),
    V4([u8; 4], u16),
}

/// Minimal one-shot SOCKS5 server
///
/// Optionally requires `user`/`pass`, answers CONNECT with `reply`, then
/// echoes one message back.
async fn spawn_server(
    auth: Option<(&'static str, &'static str)>,
    reply: u8,
) -> (SocketAddr, tokio::task::JoinHandle<io::Result<Target>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await?;
        serve(&mut sock, auth, reply).await
    });

    (addr, handle)
}

async fn serve(
    sock: &mut TcpStream,
    auth: Option<(&'static str, &'static str)>,
    reply: u8,
) -> io::Result<Target> {
    let mut head = [0u8; 2];
    sock.read_exact(&mut head).await?;
    assert_eq!(head[0], 5);
    let mut methods = vec![0u8; usize::from(head[1])];
    sock.read_exact(&mut methods).await?;

    match auth {
        Some((user, pass)) => {
            assert!(methods.contains(&0x02));
            sock.write_all(&[5, 0x02]).await?;

            let mut ver_len = [0u8; 2];
            sock.read_exact(&mut ver_len).await?;
            let mut got_user = vec![0u8; usize::from(ver_len[1])];
            sock.read_exact(&mut got_user).await?;
            let mut pass_len = [0u8; 1];
            sock.read_exact(&mut pass_len).await?;
            let mut got_pass = vec![0u8; usize::from(pass_len[0])];
            sock.read_exact(&mut got_pass).await?;

            let ok = got_user == user.as_bytes() && got_pass == pass.as_bytes();
            sock.write_all(&[1, if ok { 0 } else { 1 }]).await?;
            if !ok {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "bad creds"));
            }
        }
        None => sock.write_all(&[5, 0x00]).await?,
    }

    let mut request = [0u8; 4];
    sock.read_exact(&mut request).await?;
    assert_eq!(&request[..3], &[5, 1, 0]);

    let target = match request[3] {
        0x01 => {
            let mut ip = [0u8; 4];
            sock.read_exact(&mut ip).await?;
            let port = sock.read_u16().await?;
            Target::V4(ip, port)
        }
        0x03 => {
            let len = sock.read_u8().await?;
            let mut name = vec![0u8; usize::from(len)];
            sock.read_exact(&mut name).await?;
            let port = sock.read_u16().await?;
            Target::Domain(String::from_utf8(name).unwrap(), port)
        }
        other => panic!("unexpected address type {other}"),
    };

    sock.write_all(&[5, reply, 0, 0x01, 127, 0, 0, 1, 0x1F, 0x90])
        .await?;

    if reply == 0 {
        let mut buf = [0u8; 4];
        sock.read_exact(&mut buf).await?;
        sock.write_all(&buf).await?;
    }

    Ok(target)
}

#[tokio::test]
async fn test_connect_by_domain() {
    let (addr, server) = spawn_server(None, 0).await;
    let dialer = Socks5Dialer::new(addr.to_string());

    let mut conn = dialer.dial("tcp", "www.blocked.com:443").await.unwrap();
    conn.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    assert_eq!(
        server.await.unwrap().unwrap(),
        Target::Domain("www.blocked.com".to_string(), 443)
    );
}

#[tokio::test]
async fn test_connect_by_ipv4_with_auth() {
    let (addr, server) = spawn_server(Some(("alice", "s3cret")), 0).await;
    let dialer = Socks5Dialer::new(addr.to_string())
        .with_auth("alice", "s3cret")
        .with_forward(Arc::new(DirectDialer::new()));

    let mut conn = dialer.dial("tcp", "10.1.2.3:80").await.unwrap();
    conn.write_all(b"abcd").await.unwrap();
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.unwrap();

    assert_eq!(server.await.unwrap().unwrap(), Target::V4([10, 1, 2, 3], 80));
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let (addr, server) = spawn_server(Some(("alice", "s3cret")), 0).await;
    let dialer = Socks5Dialer::new(addr.to_string()).with_auth("alice", "wrong");

    let err = dialer.dial("tcp", "example.com:80").await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    assert!(server.await.unwrap().is_err());
}

#[tokio::test]
async fn test_server_reply_error() {
    let (addr, server) = spawn_server(None, 0x05).await;
    let dialer = Socks5Dialer::new(addr.to_string());

    let err = dialer.dial("tcp", "example.com:80").await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rejects_non_numeric_port() {
    let dialer = Socks5Dialer::new("127.0.0.1:1");
    let err = dialer.dial("tcp", "example.com:http").await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_dispatcher_routes_blocked_host_through_tunnel() {
    let (addr, server) = spawn_server(None, 0).await;
    let tunnel = Arc::new(Socks5Dialer::new(addr.to_string()));

    let mut per_host = PerHost::new(Arc::new(DirectDialer::new()), tunnel);
    per_host.add_rule("DOMAIN-SUFFIX,.blocked.com");

    let mut conn = per_host.dial("tcp", "video.blocked.com:443").await.unwrap();
    conn.write_all(b"1234").await.unwrap();
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.unwrap();

    assert_eq!(
        server.await.unwrap().unwrap(),
        Target::Domain("video.blocked.com".to_string(), 443)
    );
    assert_eq!(per_host.stats().bypass_dials, 1);
}
