// Boots one lander server per test binary and hands out its addresses.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Host and port of the shared server, published once it has bound.
static SERVER_ADDR: OnceLock<String> = OnceLock::new();

/// Ensures the test server is running and returns its `host:port`.
pub fn ensure_server() -> &'static str {
    SERVER_ADDR.get_or_init(|| {
        let published = Arc::new(OnceLock::<String>::new());
        let published_thread = Arc::clone(&published);
        // The server runs on its own OS thread so it outlives individual `#[tokio::test]`
        // runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_thread.set(addr.to_string());
                lander_server::run(listener).await.expect("server failed");
            });
        });
        wait_until_accepting(&published)
    })
}

fn wait_until_accepting(published: &OnceLock<String>) -> String {
    let addr = loop {
        if let Some(addr) = published.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return addr;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

pub fn http_url(path: &str) -> String {
    format!("http://{}{}", ensure_server(), path)
}

pub async fn connect(path: &str) -> Socket {
    let url = format!("ws://{}{}", ensure_server(), path);
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("websocket handshake");
    socket
}

pub async fn send_json(socket: &mut Socket, value: serde_json::Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Next JSON text frame, or `None` once the server closes the socket.
pub async fn next_json(socket: &mut Socket) -> Option<serde_json::Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("server reply within timeout");
        match frame {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).expect("server sends JSON"));
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// Skips frames until one with the given `type` arrives.
pub async fn next_of_type(socket: &mut Socket, kind: &str) -> serde_json::Value {
    loop {
        let value = next_json(socket)
            .await
            .unwrap_or_else(|| panic!("socket closed while waiting for {kind}"));
        if value["type"] == kind {
            return value;
        }
    }
}

/// Close code of the next close frame, skipping any text frames before it.
pub async fn next_close_code(socket: &mut Socket) -> Option<u16> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("server close within timeout");
        match frame {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}
