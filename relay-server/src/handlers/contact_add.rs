//! Handler for ContactAdd command

use tokio::io::AsyncWrite;

use relay_common::protocol::{ResponseCode, ServerMessage};
use relay_common::validators;

use super::{
    HandlerContext, authorize, err_contact_exists, err_database, err_login_invalid,
    err_unknown_login,
};
use crate::auth::Identity;
use crate::db::AddContactOutcome;
use crate::error::RelayError;

/// Handle ContactAdd command
pub async fn handle_contact_add<W>(
    login: String,
    identity: Option<&Identity>,
    ctx: &mut HandlerContext<'_, W>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let Ok(identity) = authorize(identity) else {
        return ctx.reject_unauthorized("ContactAdd").await;
    };

    let (code, error) = if let Err(e) = validators::validate_login(&login) {
        (ResponseCode::NotFound, Some(err_login_invalid(e)))
    } else {
        match ctx.db.contacts.add_contact(&identity.login, &login).await {
            Ok(AddContactOutcome::Added) => (ResponseCode::Ok, None),
            Ok(AddContactOutcome::AlreadyPresent) => {
                (ResponseCode::Conflict, Some(err_contact_exists(&login)))
            }
            Ok(AddContactOutcome::UnknownLogin) => {
                (ResponseCode::NotFound, Some(err_unknown_login(&login)))
            }
            Err(e) => {
                tracing::error!(owner = %identity.login, error = %e, "failed to add contact");
                (ResponseCode::InternalError, Some(err_database()))
            }
        }
    };

    let response = ServerMessage::ContactResponse {
        code,
        contacts: None,
        error,
    };
    Ok(ctx.send_message(&response).await?)
}
