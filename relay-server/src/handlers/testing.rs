//! Shared test utilities for handler tests

use std::net::SocketAddr;

use sqlx::sqlite::SqlitePool;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use relay_common::framing::{FrameReader, FrameWriter, MessageId};
use relay_common::io::read_server_message as io_read_server_message;
use relay_common::protocol::ServerMessage;

use super::HandlerContext;
use crate::auth::Identity;
use crate::db::Database;
use crate::db::testing::create_test_db;
use crate::registry::{Admission, ConnectionRegistry};

/// Type alias for the write half used in tests
type TestWriteHalf = tokio::net::tcp::OwnedWriteHalf;
/// Type alias for the read half used in tests
type TestReadHalf = tokio::net::tcp::OwnedReadHalf;

/// Test context that owns all resources needed for handler testing
pub struct TestContext {
    /// Client side of the socket: reads what handlers send
    pub frame_reader: FrameReader<BufReader<TestReadHalf>>,
    /// Server side of the socket: handed to handlers
    pub frame_writer: FrameWriter<TestWriteHalf>,
    pub registry: ConnectionRegistry,
    pub db: Database,
    pub pool: SqlitePool,
    pub peer_addr: SocketAddr,
    pub message_id: MessageId,
}

impl TestContext {
    /// Create a HandlerContext from this TestContext
    pub fn handler_context(&mut self) -> HandlerContext<'_, TestWriteHalf> {
        HandlerContext {
            writer: &mut self.frame_writer,
            peer_addr: self.peer_addr,
            registry: &self.registry,
            db: &self.db,
            message_id: self.message_id,
        }
    }
}

/// Helper to create test context using real TCP sockets
pub async fn create_test_context() -> TestContext {
    let pool = create_test_db().await;
    let db = Database::with_fast_hashing(pool.clone());

    // Create TCP listener on localhost
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client_handle = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

    let (server_stream, peer_addr) = listener.accept().await.unwrap();
    let (_read_half, write_half) = server_stream.into_split();
    let frame_writer = FrameWriter::new(write_half);

    let client = client_handle.await.unwrap();
    let (client_read_half, _client_write_half) = client.into_split();
    let frame_reader = FrameReader::new(BufReader::new(client_read_half));

    // Must be valid hex characters
    let message_id = MessageId::from_bytes(b"000000000000").expect("valid hex test message ID");

    TestContext {
        frame_reader,
        frame_writer,
        registry: ConnectionRegistry::new(),
        db,
        pool,
        peer_addr,
        message_id,
    }
}

/// Register `login` in the database, returning its identity
pub async fn register(test_ctx: &TestContext, login: &str) -> Identity {
    let record = test_ctx
        .db
        .clients
        .register(login, "password", "")
        .await
        .expect("Failed to register test client");
    Identity {
        client_id: record.id,
        login: record.login,
    }
}

/// Register `login` and give it a live connection in the registry
///
/// The returned admission's `outbound` receives whatever is routed to it.
pub async fn connect(test_ctx: &TestContext, login: &str) -> (Identity, Admission) {
    let identity = register(test_ctx, login).await;
    let admission = test_ctx.registry.admit(login, test_ctx.peer_addr).await;
    (identity, admission)
}

/// Read the next message the handler sent to the client
pub async fn read_server_message(test_ctx: &mut TestContext) -> ServerMessage {
    io_read_server_message(&mut test_ctx.frame_reader)
        .await
        .expect("Failed to read server message")
        .expect("Connection closed")
        .message
}
