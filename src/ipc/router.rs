use super::handlers;
use super::types::{AppState, Request};
use crate::actor::Actor;
use crate::ipc::error::{core_err, err};
use tracing::{debug, info_span};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let span = info_span!("request", id = %req.id, method = %req.method);
    let _entered = span.enter();

    let actor = match Actor::resolve(req.actor.as_ref()) {
        Ok(a) => a,
        Err(e) => return core_err(&req.id, &e),
    };
    let actor = actor.as_ref();

    let resp = dispatch(state, &req, actor);
    debug!(ok = resp["ok"].as_bool().unwrap_or(false), "request handled");
    resp
}

fn dispatch(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::onboarding::try_handle(state, req, actor) {
        return resp;
    }
    if let Some(resp) = handlers::classrooms::try_handle(state, req, actor) {
        return resp;
    }
    if let Some(resp) = handlers::invites::try_handle(state, req, actor) {
        return resp;
    }
    if let Some(resp) = handlers::bank::try_handle(state, req, actor) {
        return resp;
    }
    if let Some(resp) = handlers::tests::try_handle(state, req, actor) {
        return resp;
    }
    if let Some(resp) = handlers::attempts::try_handle(state, req, actor) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
