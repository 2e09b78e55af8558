//! Client connection handling
//!
//! Each connection runs as one task: authenticate, register with the
//! [`ConnectionRegistry`], then serve until the client leaves, the registry
//! drops the connection's queue, or the server shuts down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use relay_common::framing::{FrameError, FrameReader, FrameWriter, MessageId};
use relay_common::io::{
    ReceivedClientMessage, client_message_type, read_client_message_with_full_timeout,
    read_client_message_with_timeout, send_server_message, send_server_message_with_id,
};
use relay_common::protocol::{ClientMessage, ServerMessage};

use crate::auth::{Identity, authenticate};
use crate::config::ServerConfig;
use crate::constants::INBOUND_QUEUE_CAPACITY;
use crate::db::Database;
use crate::error::RelayError;
use crate::handlers::{
    self, HandlerContext, current_timestamp, err_already_logged_in, err_frame_too_large,
    err_malformed_frame, err_session_setup,
};
use crate::registry::{Admission, ConnectionRegistry};

/// What the reader task forwards to the worker
type Inbound = Result<Option<ReceivedClientMessage>, FrameError>;

/// Parameters for handling a connection
pub struct ConnectionParams {
    pub peer_addr: SocketAddr,
    pub registry: ConnectionRegistry,
    pub db: Database,
    pub config: Arc<ServerConfig>,
    /// Flips to `true` when the server is shutting down
    pub shutdown: watch::Receiver<bool>,
}

/// Handle a client connection
pub async fn handle_connection(socket: TcpStream, params: ConnectionParams) -> Result<(), RelayError> {
    handle_connection_inner(socket, params).await
}

/// Inner connection handler that works with any AsyncRead + AsyncWrite stream
pub async fn handle_connection_inner<S>(
    socket: S,
    params: ConnectionParams,
) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ConnectionParams {
        peer_addr,
        registry,
        db,
        config,
        mut shutdown,
    } = params;

    let (reader, writer) = tokio::io::split(socket);
    let mut frame_reader = FrameReader::with_max_payload(BufReader::new(reader), config.max_frame_size);
    let mut frame_writer = FrameWriter::new(writer);

    let handshake = tokio::select! {
        result = authenticate(
            &mut frame_reader,
            &mut frame_writer,
            &db.clients,
            config.handshake_timeout,
        ) => result,
        _ = shutdown.changed() => Err(RelayError::Transport("server shutting down".to_string())),
    };
    let authenticated = match handshake {
        Ok(authenticated) => authenticated,
        Err(e) => {
            tracing::info!(peer = %peer_addr, error = %e, "handshake rejected");
            let _ = frame_writer.shutdown().await;
            return Err(e);
        }
    };
    let identity = authenticated.identity;

    if let Err(e) = db
        .history
        .record_login(&identity.login, current_timestamp(), &peer_addr.to_string())
        .await
    {
        tracing::error!(login = %identity.login, error = %e, "failed to record login");
        let rejection = ServerMessage::AuthResponse {
            success: false,
            error: Some(err_session_setup()),
        };
        let _ =
            send_server_message_with_id(&mut frame_writer, &rejection, authenticated.message_id)
                .await;
        let _ = frame_writer.shutdown().await;
        return Err(e.into());
    }

    // Registered before the client hears it succeeded, so it is routable
    // by the time it can send anything
    let Admission {
        connection_id,
        replaced,
        outbound,
    } = registry.admit(&identity.login, peer_addr).await;
    if replaced.is_some() {
        tracing::info!(login = %identity.login, "replaced previous connection");
    }
    tracing::info!(login = %identity.login, peer = %peer_addr, "client connected");

    let accepted = ServerMessage::AuthResponse {
        success: true,
        error: None,
    };
    let result = match send_server_message_with_id(
        &mut frame_writer,
        &accepted,
        authenticated.message_id,
    )
    .await
    {
        Ok(()) => {
            let session = Session {
                identity: &identity,
                peer_addr,
                registry: &registry,
                db: &db,
                idle_timeout: config.idle_timeout,
            };
            session
                .run(frame_reader, &mut frame_writer, outbound, &mut shutdown)
                .await
        }
        Err(e) => Err(e.into()),
    };

    registry.remove_connection(&identity.login, connection_id).await;
    let _ = frame_writer.shutdown().await;

    match &result {
        Ok(()) => tracing::info!(login = %identity.login, "client disconnected"),
        Err(e) => {
            tracing::info!(login = %identity.login, error = %e, "client disconnected with error")
        }
    }
    result
}

/// An authenticated connection's serving loop
struct Session<'a> {
    identity: &'a Identity,
    peer_addr: SocketAddr,
    registry: &'a ConnectionRegistry,
    db: &'a Database,
    idle_timeout: Option<Duration>,
}

impl Session<'_> {
    async fn run<R, W>(
        &self,
        frame_reader: FrameReader<R>,
        frame_writer: &mut FrameWriter<W>,
        mut outbound: mpsc::Receiver<ServerMessage>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        if *shutdown.borrow() {
            return Ok(());
        }

        // Reads run in their own task so a half-read frame is never dropped
        // when another branch of the select wins
        let (inbound_tx, mut inbound) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let reader_task = spawn_reader(frame_reader, self.idle_timeout, inbound_tx);

        let result = loop {
            tokio::select! {
                received = inbound.recv() => {
                    match received {
                        Some(Ok(Some(received))) => {
                            if let Err(e) = self.dispatch(received, frame_writer).await {
                                break Err(e);
                            }
                        }
                        Some(Ok(None)) | None => break Ok(()),
                        Some(Err(e)) => break Err(self.reject_frame(e, frame_writer).await),
                    }
                }

                queued = outbound.recv() => {
                    match queued {
                        Some(message) => {
                            if let Err(e) = send_server_message(frame_writer, &message).await {
                                break Err(e.into());
                            }
                        }
                        // The registry dropped this connection
                        None => break Ok(()),
                    }
                }

                _ = shutdown.changed() => break Ok(()),
            }
        };

        reader_task.abort();
        result
    }

    async fn dispatch<W>(
        &self,
        received: ReceivedClientMessage,
        frame_writer: &mut FrameWriter<W>,
    ) -> Result<(), RelayError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut ctx = HandlerContext {
            writer: frame_writer,
            peer_addr: self.peer_addr,
            registry: self.registry,
            db: self.db,
            message_id: received.message_id,
        };
        let identity = Some(self.identity);

        match received.message {
            ClientMessage::ChatSend { receiver, body } => {
                handlers::handle_chat_send(receiver, body, identity, &mut ctx).await
            }
            ClientMessage::ContactAdd { login } => {
                handlers::handle_contact_add(login, identity, &mut ctx).await
            }
            ClientMessage::ContactDelete { login } => {
                handlers::handle_contact_delete(login, identity, &mut ctx).await
            }
            ClientMessage::ContactList => handlers::handle_contact_list(identity, &mut ctx).await,
            ClientMessage::History { with } => handlers::handle_history(with, identity, &mut ctx).await,
            message @ (ClientMessage::Hello { .. } | ClientMessage::ChallengeResponse { .. }) => {
                let command = client_message_type(&message);
                ctx.send_error_and_disconnect(&err_already_logged_in(), Some(command))
                    .await
            }
        }
    }

    /// Tell the client why its frame was refused, returning the error to close with
    async fn reject_frame<W>(&self, error: FrameError, frame_writer: &mut FrameWriter<W>) -> RelayError
    where
        W: AsyncWrite + Unpin,
    {
        let message = match &error {
            FrameError::FrameTooLarge { max, .. } => Some(err_frame_too_large(*max)),
            // Nobody left to tell
            FrameError::Io(_) | FrameError::ConnectionClosed => None,
            FrameError::IdleTimeout => None,
            other => Some(err_malformed_frame(&other.to_string())),
        };

        if let Some(message) = message {
            tracing::debug!(login = %self.identity.login, error = %error, "refusing frame");
            let reply = ServerMessage::Error {
                message,
                command: None,
            };
            let _ = send_server_message_with_id(frame_writer, &reply, MessageId::new()).await;
        }

        error.into()
    }
}

/// Forward frames from the socket until it closes or fails
fn spawn_reader<R>(
    mut frame_reader: FrameReader<R>,
    idle_timeout: Option<Duration>,
    inbound_tx: mpsc::Sender<Inbound>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let result = match idle_timeout {
                Some(idle) => read_client_message_with_full_timeout(&mut frame_reader, idle).await,
                None => read_client_message_with_timeout(&mut frame_reader).await,
            };
            let last = !matches!(result, Ok(Some(_)));
            if inbound_tx.send(result).await.is_err() || last {
                break;
            }
        }
    })
}
