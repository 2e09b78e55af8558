//! Challenge-response authentication for new connections

use std::sync::OnceLock;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use relay_common::auth::{self, DECOY_SECRET_LENGTH, NONCE_LENGTH};
use relay_common::framing::{FrameReader, FrameWriter, MessageId};
use relay_common::io::{
    ReceivedClientMessage, read_client_message_with_timeout, send_server_message_with_id,
};
use relay_common::protocol::{ClientMessage, ServerMessage};
use relay_common::validators;

use crate::db::{AuthMaterial, ClientDb};
use crate::error::RelayError;

/// An authenticated client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub client_id: i64,
    pub login: String,
}

/// Where a handshake currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingHello,
    ChallengeSent,
    Authenticated,
    Rejected,
}

/// Keys the decoy salts handed to unregistered logins for this process
fn decoy_secret() -> &'static [u8; DECOY_SECRET_LENGTH] {
    static SECRET: OnceLock<[u8; DECOY_SECRET_LENGTH]> = OnceLock::new();
    SECRET.get_or_init(auth::generate_decoy_secret)
}

/// Nonce and expected key for one in-progress handshake
struct ChallengeSession {
    login: String,
    nonce: [u8; NONCE_LENGTH],
    /// `None` for logins that are not registered
    material: Option<AuthMaterial>,
}

/// Handshake state machine for one connection
///
/// Pure: it never touches the transport, so it can be driven by
/// [`authenticate`] or directly by tests.
pub struct Handshake {
    state: HandshakeState,
    session: Option<ChallengeSession>,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::AwaitingHello,
            session: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Answer a `Hello` with a challenge
    ///
    /// Unknown logins receive a decoy salt that is stable per login, so
    /// neither one reply nor repeated ones reveal whether the login exists.
    /// They are rejected when the digest arrives.
    pub fn on_hello(
        &mut self,
        login: &str,
        material: Option<AuthMaterial>,
    ) -> Result<ServerMessage, RelayError> {
        if self.state != HandshakeState::AwaitingHello {
            return Err(self.reject("unexpected Hello"));
        }

        let nonce = auth::generate_nonce();
        let salt = match &material {
            Some(material) => material.salt.clone(),
            None => match auth::decoy_salt(decoy_secret(), login) {
                Ok(salt) => salt,
                Err(e) => return Err(self.reject(&e.to_string())),
            },
        };

        self.session = Some(ChallengeSession {
            login: login.to_string(),
            nonce,
            material,
        });
        self.state = HandshakeState::ChallengeSent;

        Ok(ServerMessage::Challenge {
            nonce: hex::encode(nonce),
            salt,
        })
    }

    /// Check the client's digest against the outstanding challenge
    pub fn on_response(&mut self, digest: &str) -> Result<Identity, RelayError> {
        if self.state != HandshakeState::ChallengeSent {
            return Err(self.reject("unexpected ChallengeResponse"));
        }
        let Some(session) = self.session.take() else {
            return Err(self.reject("no outstanding challenge"));
        };
        let Some(material) = session.material else {
            return Err(self.reject(&format!("unknown login '{}'", session.login)));
        };

        match auth::verify_digest(&material.key, &session.nonce, digest) {
            Ok(true) => {
                self.state = HandshakeState::Authenticated;
                Ok(Identity {
                    client_id: material.client_id,
                    login: session.login,
                })
            }
            Ok(false) => Err(self.reject(&format!("wrong digest for '{}'", session.login))),
            Err(e) => Err(self.reject(&e.to_string())),
        }
    }

    fn reject(&mut self, reason: &str) -> RelayError {
        self.state = HandshakeState::Rejected;
        self.session = None;
        RelayError::AuthenticationFailed(reason.to_string())
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful [`authenticate`]
#[derive(Debug)]
pub struct Authenticated {
    pub identity: Identity,
    /// Message ID of the `ChallengeResponse`, for correlating `AuthResponse`
    pub message_id: MessageId,
}

/// Run the handshake on a fresh connection
///
/// The whole exchange must finish within `timeout`. On failure an
/// `AuthResponse { success: false }` is attempted before returning; the
/// caller closes the transport. `AuthResponse { success: true }` is left to
/// the caller, which sends it once the connection is registered.
pub async fn authenticate<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    clients: &ClientDb,
    timeout: Duration,
) -> Result<Authenticated, RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut last_message_id = MessageId::default();
    let outcome = tokio::time::timeout(
        timeout,
        run_handshake(reader, writer, clients, &mut last_message_id),
    )
    .await;

    let result = match outcome {
        Ok(result) => result,
        Err(_) => Err(RelayError::AuthenticationFailed(
            "handshake timed out".to_string(),
        )),
    };

    if result.is_err() {
        let rejection = ServerMessage::AuthResponse {
            success: false,
            error: Some("authentication failed".to_string()),
        };
        // The peer may already be gone
        let _ = send_server_message_with_id(writer, &rejection, last_message_id).await;
    }

    result
}

async fn run_handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    clients: &ClientDb,
    last_message_id: &mut MessageId,
) -> Result<Authenticated, RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut handshake = Handshake::new();

    let hello = next_message(reader).await?;
    *last_message_id = hello.message_id;
    let ClientMessage::Hello { login } = hello.message else {
        return Err(RelayError::AuthenticationFailed(
            "expected Hello".to_string(),
        ));
    };

    // Malformed logins are treated like unknown ones
    let material = if validators::validate_login(&login).is_ok() {
        clients.auth_material(&login).await?
    } else {
        None
    };

    let challenge = handshake.on_hello(&login, material)?;
    send_server_message_with_id(writer, &challenge, hello.message_id).await?;

    let response = next_message(reader).await?;
    *last_message_id = response.message_id;
    let ClientMessage::ChallengeResponse { digest } = response.message else {
        return Err(RelayError::AuthenticationFailed(
            "expected ChallengeResponse".to_string(),
        ));
    };

    let identity = handshake.on_response(&digest)?;
    Ok(Authenticated {
        identity,
        message_id: response.message_id,
    })
}

async fn next_message<R>(reader: &mut FrameReader<R>) -> Result<ReceivedClientMessage, RelayError>
where
    R: AsyncRead + Unpin,
{
    match read_client_message_with_timeout(reader).await? {
        Some(received) => Ok(received),
        None => Err(RelayError::Transport(
            "connection closed during handshake".to_string(),
        )),
    }
}
