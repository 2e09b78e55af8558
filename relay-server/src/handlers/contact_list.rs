//! Handler for ContactList command

use tokio::io::AsyncWrite;

use relay_common::protocol::{ResponseCode, ServerMessage};

use super::{HandlerContext, authorize, err_database};
use crate::auth::Identity;
use crate::error::RelayError;

/// Handle ContactList command
///
/// The list comes back with `202 Accepted`, not `200`.
pub async fn handle_contact_list<W>(
    identity: Option<&Identity>,
    ctx: &mut HandlerContext<'_, W>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let Ok(identity) = authorize(identity) else {
        return ctx.reject_unauthorized("ContactList").await;
    };

    let response = match ctx.db.contacts.list_contacts(&identity.login).await {
        Ok(contacts) => ServerMessage::ContactResponse {
            code: ResponseCode::Accepted,
            contacts: Some(contacts),
            error: None,
        },
        Err(e) => {
            tracing::error!(owner = %identity.login, error = %e, "failed to list contacts");
            ServerMessage::ContactResponse {
                code: ResponseCode::InternalError,
                contacts: None,
                error: Some(err_database()),
            }
        }
    };
    Ok(ctx.send_message(&response).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{create_test_context, read_server_message, register};

    #[tokio::test]
    async fn test_list_in_insertion_order() {
        let mut test_ctx = create_test_context().await;
        let alice = register(&test_ctx, "alice").await;
        register(&test_ctx, "carol").await;
        register(&test_ctx, "bob").await;
        test_ctx.db.contacts.add_contact("alice", "carol").await.unwrap();
        test_ctx.db.contacts.add_contact("alice", "bob").await.unwrap();

        handle_contact_list(Some(&alice), &mut test_ctx.handler_context())
            .await
            .unwrap();

        assert_eq!(
            read_server_message(&mut test_ctx).await,
            ServerMessage::ContactResponse {
                code: ResponseCode::Accepted,
                contacts: Some(vec!["carol".to_string(), "bob".to_string()]),
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_list() {
        let mut test_ctx = create_test_context().await;
        let alice = register(&test_ctx, "alice").await;

        handle_contact_list(Some(&alice), &mut test_ctx.handler_context())
            .await
            .unwrap();

        assert_eq!(
            read_server_message(&mut test_ctx).await,
            ServerMessage::ContactResponse {
                code: ResponseCode::Accepted,
                contacts: Some(Vec::new()),
                error: None,
            }
        );
    }
}
