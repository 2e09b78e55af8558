//! Handler for History command

use tokio::io::AsyncWrite;

use relay_common::protocol::{HistoryEntry, ResponseCode, ServerMessage};
use relay_common::validators;

use super::{HandlerContext, authorize, err_database, err_unknown_login};
use crate::auth::Identity;
use crate::error::RelayError;

fn failure(code: ResponseCode, error: String) -> ServerMessage {
    ServerMessage::HistoryResponse {
        code,
        messages: Vec::new(),
        error: Some(error),
    }
}

/// Handle History command: the conversation between the caller and `with`
pub async fn handle_history<W>(
    with: String,
    identity: Option<&Identity>,
    ctx: &mut HandlerContext<'_, W>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let Ok(identity) = authorize(identity) else {
        return ctx.reject_unauthorized("History").await;
    };

    if validators::validate_login(&with).is_err() {
        return Ok(ctx
            .send_message(&failure(ResponseCode::NotFound, err_unknown_login(&with)))
            .await?);
    }

    let lookup = match ctx.db.clients.exists(&with).await {
        Ok(true) => ctx.db.messages.messages_between(&identity.login, &with).await,
        Ok(false) => {
            return Ok(ctx
                .send_message(&failure(ResponseCode::NotFound, err_unknown_login(&with)))
                .await?);
        }
        Err(e) => Err(e),
    };

    let response = match lookup {
        Ok(records) => ServerMessage::HistoryResponse {
            code: ResponseCode::Ok,
            messages: records.into_iter().map(HistoryEntry::from).collect(),
            error: None,
        },
        Err(e) => {
            tracing::error!(login = %identity.login, error = %e, "failed to load history");
            failure(ResponseCode::InternalError, err_database())
        }
    };
    Ok(ctx.send_message(&response).await?)
}
