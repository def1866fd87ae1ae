//! /v1/message routes

use hyper::StatusCode;
use serde::Deserialize;

use super::{ok, HttpResponse};
use crate::auth::AuthMode;
use crate::server::codec::{respond, ApiRequest};
use crate::server::AppState;
use crate::services::message as flow;
use crate::services::translation::{
    poll_translation, start_translation, JobPoll, TranslateMessageInput,
};
use crate::services::writing::{CreateMessageInput, UpdateMessageInput};
use crate::types::{Id, Result, SuccessResponse};

#[derive(Debug, Deserialize)]
struct QueryId {
    id: Id,
    #[serde(default)]
    fields: String,
}

pub async fn create(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Required)?;
    let input: CreateMessageInput = req.body()?;
    let msg = flow::create_message(&state.backends, &ctx, &input).await?;
    Ok(ok(req, msg))
}

pub async fn update(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Required)?;
    let input: UpdateMessageInput = req.body()?;
    let msg = flow::update_message(&state.backends, &ctx, &input).await?;
    Ok(ok(req, msg))
}

pub async fn get(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::AllowAnon)?;
    let query: QueryId = req.query()?;
    let msg = flow::get_message(&state.backends, &ctx, query.id, &query.fields).await?;
    Ok(ok(req, msg))
}

/// Start a translation; 202 with the job id
pub async fn translate(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Required)?;
    let input: TranslateMessageInput = req.body()?;
    let job = start_translation(&state.backends, &state.jobs, &ctx, input).await?;
    Ok(respond(
        req.codec(),
        StatusCode::ACCEPTED,
        &SuccessResponse::job(job, None, ()),
    ))
}

pub async fn by_job(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Required)?;
    let query: QueryId = req.query()?;
    match poll_translation(&state.backends, &ctx, query.id, &query.fields).await? {
        JobPoll::Done(msg) => Ok(ok(req, msg)),
        JobPoll::Pending { job, progress } => Ok(respond(
            req.codec(),
            StatusCode::ACCEPTED,
            &SuccessResponse::job(job, Some(progress), ()),
        )),
    }
}
