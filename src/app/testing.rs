use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use crate::config::address::Address;

/// Spawn a server echoing back everything it reads.
pub async fn echo_server() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut s, _)) = listener.accept().await else {
                return;
            };

            tokio::spawn(async move {
                let (mut rx, mut tx) = s.split();
                let _ = tokio::io::copy(&mut rx, &mut tx).await;
            });
        }
    });

    addr.to_string().parse().unwrap()
}

/// A loopback address nothing is listening on.
pub async fn unused_address() -> Address {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    addr.to_string().parse().unwrap()
}

/// Connect, retrying while the listener is still being set up.
pub async fn connect(addr: SocketAddr) -> TcpStream {
    for _ in 0..100 {
        if let Ok(s) = TcpStream::connect(addr).await {
            return s;
        }
        sleep(Duration::from_millis(20)).await;
    }

    panic!("{addr} never became connectable");
}

/// Assert the peer closes `s` in bounded time, discarding anything still in
/// flight.
pub async fn assert_closed(s: &mut TcpStream) {
    let mut buf = [0; 1024];

    let closed = timeout(Duration::from_secs(5), async {
        loop {
            match s.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;

    assert!(closed.is_ok(), "connection was not closed");
}
