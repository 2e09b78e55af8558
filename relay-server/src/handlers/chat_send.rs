//! Handler for ChatSend command

use tokio::io::AsyncWrite;

use relay_common::protocol::{ResponseCode, ServerMessage};
use relay_common::validators;

use super::{
    HandlerContext, authorize, current_timestamp, err_database, err_message_invalid,
    err_unknown_login,
};
use crate::auth::Identity;
use crate::error::RelayError;

fn response(code: ResponseCode, delivered: usize, error: Option<String>) -> ServerMessage {
    ServerMessage::ChatSendResponse {
        code,
        delivered,
        error,
    }
}

/// Handle ChatSend command
///
/// An empty `receiver` broadcasts to every other connected client. A
/// directed message must name a registered login. The message is persisted
/// before anything is delivered; if that fails nothing is delivered.
pub async fn handle_chat_send<W>(
    receiver: String,
    body: String,
    identity: Option<&Identity>,
    ctx: &mut HandlerContext<'_, W>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let Ok(identity) = authorize(identity) else {
        return ctx.reject_unauthorized("ChatSend").await;
    };

    if let Err(e) = validators::validate_message(&body) {
        let reply = response(ResponseCode::BadRequest, 0, Some(err_message_invalid(e)));
        return Ok(ctx.send_message(&reply).await?);
    }

    let directed = !receiver.is_empty();
    if directed {
        let known = if validators::validate_login(&receiver).is_ok() {
            match ctx.db.clients.exists(&receiver).await {
                Ok(known) => known,
                Err(e) => {
                    tracing::error!(error = %e, "receiver lookup failed");
                    let reply = response(ResponseCode::InternalError, 0, Some(err_database()));
                    return Ok(ctx.send_message(&reply).await?);
                }
            }
        } else {
            false
        };

        if !known {
            let reply = response(ResponseCode::NotFound, 0, Some(err_unknown_login(&receiver)));
            return Ok(ctx.send_message(&reply).await?);
        }
    }

    let timestamp = current_timestamp();
    if let Err(e) = ctx
        .db
        .messages
        .record_message(&identity.login, &receiver, &body, timestamp)
        .await
    {
        tracing::error!(sender = %identity.login, error = %e, "failed to persist message");
        let reply = response(ResponseCode::InternalError, 0, Some(err_database()));
        return Ok(ctx.send_message(&reply).await?);
    }

    let message = ServerMessage::ChatMessage {
        sender: identity.login.clone(),
        receiver: receiver.clone(),
        body,
        timestamp,
    };

    if !directed {
        let delivered = ctx.registry.broadcast(&identity.login, &message).await;
        return Ok(ctx
            .send_message(&response(ResponseCode::Ok, delivered, None))
            .await?);
    }

    // Stored for history, never echoed back
    if receiver == identity.login {
        return Ok(ctx
            .send_message(&response(ResponseCode::Accepted, 0, None))
            .await?);
    }

    let reply = match ctx.registry.send_to(&receiver, message).await {
        Ok(()) => response(ResponseCode::Ok, 1, None),
        Err(e) => {
            tracing::debug!(sender = %identity.login, error = %e, "stored for offline receiver");
            response(ResponseCode::Accepted, 0, None)
        }
    };
    Ok(ctx.send_message(&reply).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{connect, create_test_context, read_server_message, register};

    #[tokio::test]
    async fn test_chat_send_requires_login() {
        let mut test_ctx = create_test_context().await;

        let result = handle_chat_send(
            String::new(),
            "hello".to_string(),
            None,
            &mut test_ctx.handler_context(),
        )
        .await;

        assert!(matches!(result, Err(RelayError::Unauthorized)));
        assert!(matches!(
            read_server_message(&mut test_ctx).await,
            ServerMessage::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_others_not_sender() {
        let mut test_ctx = create_test_context().await;
        let (alice, mut alice_conn) = connect(&test_ctx, "alice").await;
        let (_bob, mut bob_conn) = connect(&test_ctx, "bob").await;
        let (_carol, mut carol_conn) = connect(&test_ctx, "carol").await;

        handle_chat_send(
            String::new(),
            "hello all".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        assert_eq!(
            read_server_message(&mut test_ctx).await,
            response(ResponseCode::Ok, 2, None)
        );
        for conn in [&mut bob_conn, &mut carol_conn] {
            match conn.outbound.try_recv().unwrap() {
                ServerMessage::ChatMessage {
                    sender,
                    receiver,
                    body,
                    ..
                } => {
                    assert_eq!(sender, "alice");
                    assert_eq!(receiver, "");
                    assert_eq!(body, "hello all");
                }
                other => panic!("Expected ChatMessage, got {:?}", other),
            }
        }
        assert!(alice_conn.outbound.try_recv().is_err());

        let stored = test_ctx.db.messages.broadcasts().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender, "alice");
    }

    #[tokio::test]
    async fn test_directed_to_connected_receiver() {
        let mut test_ctx = create_test_context().await;
        let (alice, _alice_conn) = connect(&test_ctx, "alice").await;
        let (_bob, mut bob_conn) = connect(&test_ctx, "bob").await;
        let (_carol, mut carol_conn) = connect(&test_ctx, "carol").await;

        handle_chat_send(
            "bob".to_string(),
            "hi bob".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        assert_eq!(
            read_server_message(&mut test_ctx).await,
            response(ResponseCode::Ok, 1, None)
        );
        assert!(matches!(
            bob_conn.outbound.try_recv().unwrap(),
            ServerMessage::ChatMessage { ref receiver, .. } if receiver == "bob"
        ));
        assert!(carol_conn.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_directed_to_offline_receiver_is_accepted_and_stored() {
        let mut test_ctx = create_test_context().await;
        let (alice, _alice_conn) = connect(&test_ctx, "alice").await;
        register(&test_ctx, "bob").await;

        handle_chat_send(
            "bob".to_string(),
            "are you there?".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        assert_eq!(
            read_server_message(&mut test_ctx).await,
            response(ResponseCode::Accepted, 0, None)
        );
        let stored = test_ctx
            .db
            .messages
            .messages_between("alice", "bob")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].body, "are you there?");
    }

    #[tokio::test]
    async fn test_directed_to_unknown_login_not_stored() {
        let mut test_ctx = create_test_context().await;
        let (alice, _alice_conn) = connect(&test_ctx, "alice").await;

        handle_chat_send(
            "nobody".to_string(),
            "hello?".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        match read_server_message(&mut test_ctx).await {
            ServerMessage::ChatSendResponse { code, error, .. } => {
                assert_eq!(code, ResponseCode::NotFound);
                assert!(error.is_some());
            }
            other => panic!("Expected ChatSendResponse, got {:?}", other),
        }
        assert!(
            test_ctx
                .db
                .messages
                .messages_between("alice", "nobody")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_directed_to_self_is_stored_not_echoed() {
        let mut test_ctx = create_test_context().await;
        let (alice, mut alice_conn) = connect(&test_ctx, "alice").await;

        handle_chat_send(
            "alice".to_string(),
            "note to self".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        assert_eq!(
            read_server_message(&mut test_ctx).await,
            response(ResponseCode::Accepted, 0, None)
        );
        assert!(alice_conn.outbound.try_recv().is_err());
        assert_eq!(
            test_ctx
                .db
                .messages
                .messages_between("alice", "alice")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_body_rejected() {
        let mut test_ctx = create_test_context().await;
        let (alice, _alice_conn) = connect(&test_ctx, "alice").await;
        let (_bob, mut bob_conn) = connect(&test_ctx, "bob").await;

        handle_chat_send(
            String::new(),
            "   ".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        match read_server_message(&mut test_ctx).await {
            ServerMessage::ChatSendResponse { code, .. } => {
                assert_eq!(code, ResponseCode::BadRequest);
            }
            other => panic!("Expected ChatSendResponse, got {:?}", other),
        }
        assert!(bob_conn.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_persistence_failure_delivers_nothing() {
        let mut test_ctx = create_test_context().await;
        let (alice, _alice_conn) = connect(&test_ctx, "alice").await;
        let (_bob, mut bob_conn) = connect(&test_ctx, "bob").await;

        test_ctx.pool.close().await;

        handle_chat_send(
            String::new(),
            "lost".to_string(),
            Some(&alice),
            &mut test_ctx.handler_context(),
        )
        .await
        .unwrap();

        match read_server_message(&mut test_ctx).await {
            ServerMessage::ChatSendResponse {
                code, delivered, ..
            } => {
                assert_eq!(code, ResponseCode::InternalError);
                assert_eq!(delivered, 0);
            }
            other => panic!("Expected ChatSendResponse, got {:?}", other),
        }
        assert!(bob_conn.outbound.try_recv().is_err());
    }
}
