//! End-to-end: a real listener, raw HTTP/1.1 on a TCP socket.

use std::sync::Arc;
use std::time::Duration;

use hostmux::{MuxExt, Request, Router, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_and_accepts_routes_registered_after_start() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = Arc::new(Router::new());
    router.get("*", "/", |_req: Request| async { "home" }, []);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::from_listener(listener).serve_with_shutdown(Arc::clone(&router), async {
            let _ = stop_rx.await;
        }),
    );

    let res = roundtrip(addr, "GET / HTTP/1.1\r\nhost: a.test\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.ends_with("home"), "{res}");

    // Registered while the listener is live.
    router.post("api.test", "/echo", |req: Request| async move {
        String::from_utf8_lossy(req.body()).into_owned()
    }, []);

    let res = roundtrip(
        addr,
        "POST /echo HTTP/1.1\r\nhost: edge.test\r\nx-forwarded-host: api.test\r\n\
         content-length: 5\r\nconnection: close\r\n\r\nhello",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.ends_with("hello"), "{res}");

    let res = roundtrip(
        addr,
        "GET /nope HTTP/1.1\r\nhost: a.test\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");
    assert!(res.ends_with("404 page not found\n"), "{res}");

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
