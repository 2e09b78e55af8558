//! Shared helpers for integration tests: a live server on a temp database
//! and a client that speaks the wire protocol.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use relay_common::auth::{derive_auth_key, respond_to_challenge};
use relay_common::framing::{FrameReader, FrameWriter};
use relay_common::io::{read_server_message, send_client_message};
use relay_common::protocol::{ClientMessage, ServerMessage};
use relay_server::db::{self, Database};
use relay_server::registry::ConnectionRegistry;
use relay_server::{RelayError, Server, ServerConfig};

/// Password every pre-registered test client uses
pub const PASSWORD: &str = "secret";

/// How long a test waits for any single event
pub const WAIT: Duration = Duration::from_secs(5);

/// A running server backed by an on-disk database in a temp directory
pub struct TestServer {
    pub addr: SocketAddr,
    pub db: Database,
    pub registry: ConnectionRegistry,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), RelayError>>,
    _dir: TempDir,
}

impl TestServer {
    /// Start a server with alice, bob and carol registered
    pub async fn start(config: ServerConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let pool = db::init_db(&dir.path().join("relay.db"))
            .await
            .expect("Failed to initialize database");
        let database = Database::with_fast_hashing(pool);
        for login in ["alice", "bob", "carol"] {
            database
                .clients
                .register(login, PASSWORD, "")
                .await
                .expect("Failed to register test client");
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::from_listener(listener, config, database.clone());
        let addr = server.local_addr().unwrap();
        let registry = server.registry().clone();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stop_rx.await;
        }));

        Self {
            addr,
            db: database,
            registry,
            stop: Some(stop_tx),
            handle,
            _dir: dir,
        }
    }

    pub async fn start_default() -> Self {
        Self::start(ServerConfig::default()).await
    }

    /// Trigger shutdown and wait for the accept loop to finish
    pub async fn stop(mut self) -> Result<(), RelayError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(15), &mut self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }

    /// Wait until `login` is (or is no longer) registered
    pub async fn wait_connected(&self, login: &str, connected: bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.registry.is_connected(login).await != connected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for '{}' connected={}",
                login,
                connected
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// A protocol client over a real TCP connection
pub struct TestClient {
    reader: FrameReader<BufReader<OwnedReadHalf>>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FrameReader::new(BufReader::new(read_half)),
            writer: FrameWriter::new(write_half),
        }
    }

    /// Connect and authenticate, panicking if the server refuses
    pub async fn login(addr: SocketAddr, login: &str) -> Self {
        let mut client = Self::connect(addr).await;
        match client.handshake(login, PASSWORD).await {
            ServerMessage::AuthResponse { success: true, .. } => client,
            other => panic!("Login as '{}' failed: {:?}", login, other),
        }
    }

    /// Send `Hello` and return the challenge's `(nonce, salt)`
    pub async fn hello(&mut self, login: &str) -> (String, String) {
        self.send(&ClientMessage::Hello {
            login: login.to_string(),
        })
        .await;
        match self.recv().await {
            Some(ServerMessage::Challenge { nonce, salt }) => (nonce, salt),
            other => panic!("Expected Challenge, got {:?}", other),
        }
    }

    /// Run the challenge-response exchange, returning the `AuthResponse`
    pub async fn handshake(&mut self, login: &str, password: &str) -> ServerMessage {
        let (nonce, salt) = self.hello(login).await;
        let key = derive_auth_key(password, &salt).unwrap();
        let digest = respond_to_challenge(&key, &nonce).unwrap();
        self.send(&ClientMessage::ChallengeResponse { digest }).await;
        self.recv().await.expect("Connection closed during handshake")
    }

    pub async fn send(&mut self, message: &ClientMessage) {
        send_client_message(&mut self.writer, message)
            .await
            .expect("Failed to send message");
    }

    /// Write bytes straight to the socket, bypassing framing
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let stream = self.writer.get_mut();
        stream.write_all(bytes).await.expect("Failed to write");
        stream.flush().await.expect("Failed to flush");
    }

    /// Next message from the server, `None` if the connection closed
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        tokio::time::timeout(WAIT, read_server_message(&mut self.reader))
            .await
            .expect("timed out waiting for server message")
            .ok()
            .flatten()
            .map(|received| received.message)
    }

    /// Drain messages until the server closes the connection
    ///
    /// Returns the messages received before the close.
    pub async fn expect_closed(&mut self) -> Vec<ServerMessage> {
        let mut seen = Vec::new();
        while let Some(message) = self.recv().await {
            seen.push(message);
        }
        seen
    }
}
