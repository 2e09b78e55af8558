//! Handler for ContactDelete command

use tokio::io::AsyncWrite;

use relay_common::protocol::{ResponseCode, ServerMessage};

use super::{HandlerContext, authorize, err_contact_not_found, err_database};
use crate::auth::Identity;
use crate::db::RemoveContactOutcome;
use crate::error::RelayError;

/// Handle ContactDelete command
pub async fn handle_contact_delete<W>(
    login: String,
    identity: Option<&Identity>,
    ctx: &mut HandlerContext<'_, W>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let Ok(identity) = authorize(identity) else {
        return ctx.reject_unauthorized("ContactDelete").await;
    };

    let (code, error) = match ctx.db.contacts.remove_contact(&identity.login, &login).await {
        Ok(RemoveContactOutcome::Removed) => (ResponseCode::Ok, None),
        Ok(RemoveContactOutcome::NotPresent | RemoveContactOutcome::UnknownLogin) => {
            (ResponseCode::NotFound, Some(err_contact_not_found(&login)))
        }
        Err(e) => {
            tracing::error!(owner = %identity.login, error = %e, "failed to remove contact");
            (ResponseCode::InternalError, Some(err_database()))
        }
    };

    let response = ServerMessage::ContactResponse {
        code,
        contacts: None,
        error,
    };
    Ok(ctx.send_message(&response).await?)
}
