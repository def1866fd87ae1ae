//! Message create, update and read, with group checks

use tracing::info;

use super::translation::valid_language;
use super::writing::{CreateMessageInput, MessageOutput, UpdateMessageInput, MAX_CONTEXT_LEN};
use super::Backends;
use crate::auth::{require_role, ReqContext, Role};
use crate::content::MessageBody;
use crate::types::{ApiError, Id, RawBytes, Result};

fn check_context(context: &str) -> Result<()> {
    if context.len() > MAX_CONTEXT_LEN {
        return Err(ApiError::BadRequest(format!(
            "context is longer than {} bytes",
            MAX_CONTEXT_LEN
        )));
    }
    Ok(())
}

fn check_language(language: &str) -> Result<()> {
    if !valid_language(language) {
        return Err(ApiError::BadRequest(format!("invalid language {:?}", language)));
    }
    Ok(())
}

fn check_body(message: &RawBytes) -> Result<()> {
    MessageBody::decode(message).map(|_| ())
}

pub async fn create_message(
    backends: &Backends,
    ctx: &ReqContext,
    input: &CreateMessageInput,
) -> Result<MessageOutput> {
    if input.attach_to.is_zero() {
        return Err(ApiError::BadRequest("attach_to is required".into()));
    }
    check_language(&input.language)?;
    check_context(&input.context)?;
    check_body(&input.message)?;
    require_role(backends.userbase.as_ref(), ctx, input.attach_to, Role::MEMBER).await?;

    let msg = backends.writing.create_message(ctx, input).await?;
    info!(message = %msg.id, gid = %msg.attach_to, "message created");
    Ok(msg)
}

pub async fn update_message(
    backends: &Backends,
    ctx: &ReqContext,
    input: &UpdateMessageInput,
) -> Result<MessageOutput> {
    if let Some(language) = &input.language {
        check_language(language)?;
    }
    if let Some(context) = &input.context {
        check_context(context)?;
    }
    if let Some(message) = &input.message {
        check_body(message)?;
    }
    if input.language.is_none() && input.context.is_none() && input.message.is_none() {
        return Err(ApiError::BadRequest("nothing to update".into()));
    }

    let current = backends.writing.get_message(ctx, input.id, "").await?;
    require_role(backends.userbase.as_ref(), ctx, current.attach_to, Role::MEMBER).await?;
    if current.version != input.version {
        return Err(ApiError::Conflict(format!(
            "message version is {}, not {}",
            current.version, input.version
        )));
    }

    backends.writing.update_message(ctx, input).await
}

pub async fn get_message(
    backends: &Backends,
    ctx: &ReqContext,
    id: Id,
    fields: &str,
) -> Result<MessageOutput> {
    let msg = backends.writing.get_message(ctx, id, fields).await?;
    require_role(backends.userbase.as_ref(), ctx, msg.attach_to, Role::PUBLIC).await?;
    Ok(msg)
}
