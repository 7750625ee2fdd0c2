//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use room_gateway::chat::ChatBackend;
use room_gateway::config::GatewayConfig;
use room_gateway::http::HttpServer;
use room_gateway::lifecycle::Shutdown;

/// An upgraded client connection driven from the test.
pub struct MockSocket {
    incoming: mpsc::UnboundedReceiver<Result<Message, axum::Error>>,
    outgoing: mpsc::UnboundedSender<Message>,
    closes: Arc<AtomicUsize>,
}

/// The browser's side of a [`MockSocket`].
pub struct MockClient {
    tx: Option<mpsc::UnboundedSender<Result<Message, axum::Error>>>,
    rx: mpsc::UnboundedReceiver<Message>,
    closes: Arc<AtomicUsize>,
}

pub fn mock_socket() -> (MockSocket, MockClient) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));
    (
        MockSocket {
            incoming: in_rx,
            outgoing: out_tx,
            closes: closes.clone(),
        },
        MockClient {
            tx: Some(in_tx),
            rx: out_rx,
            closes,
        },
    )
}

impl MockClient {
    pub fn send_text(&self, text: &str) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Ok(Message::Text(text.into())));
        }
    }

    pub fn send_error(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Err(axum::Error::new("connection reset by peer")));
        }
    }

    /// Drop the read side: the gateway sees EOF.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Next frame written by the gateway, within one second.
    pub async fn recv(&mut self) -> Option<Message> {
        tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn recv_text(&mut self) -> String {
        match self.recv().await {
            Some(Message::Text(text)) => text.as_str().to_string(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// How many times the gateway closed the connection.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Stream for MockSocket {
    type Item = Result<Message, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_recv(cx)
    }
}

impl Sink<Message> for MockSocket {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.outgoing
            .send(item)
            .map_err(|_| axum::Error::new("client gone"))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

pub async fn start_gateway(mut config: GatewayConfig, backend: Arc<dyn ChatBackend>) -> TestGateway {
    config.timeouts.shutdown_grace_secs = 1;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, backend, shutdown.clone());
    let task = tokio::spawn(server.run(listener));
    TestGateway {
        addr,
        shutdown,
        task,
    }
}

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request line and headers, header names lowercased.
    pub head: String,
    pub body: String,
}

/// Start a mock REST upstream that records every request and answers
/// `200 ok` with its own CORS headers.
pub async fn start_recording_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let _ = tx.send(request);
                let body = "ok";
                let response = format!(
                    "HTTP/1.1 200 OK\r\n\
                     Content-Length: {}\r\n\
                     Access-Control-Allow-Origin: *\r\n\
                     Access-Control-Allow-Credentials: false\r\n\
                     X-Upstream: users\r\n\
                     Connection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

    let head = head
        .lines()
        .enumerate()
        .map(|(i, line)| match (i, line.split_once(':')) {
            (0, _) | (_, None) => line.to_string(),
            (_, Some((name, value))) => format!("{}:{}", name.to_ascii_lowercase(), value),
        })
        .collect::<Vec<_>>()
        .join("\n");

    Some(RecordedRequest { head, body })
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
