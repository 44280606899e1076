use crate::actor::Actor;
use crate::ipc::error::err;
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, reply, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::LearnerRole;
use crate::roster;
use chrono::Utc;

fn handle_create(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_name = match optional_str(req, "studentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let days = match optional_i64(req, "expiresInDays") {
        Ok(v) => v.unwrap_or(state.config.invite_ttl_days),
        Err(e) => return e,
    };
    reply(
        req,
        Some("invite"),
        roster::create_invite(conn, actor, &workspace_id, student_name.as_deref(), days, Utc::now()),
    )
}

fn handle_inspect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let token = match required_str(req, "token") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, None, roster::inspect_invite(conn, &token, Utc::now()))
}

fn handle_claim(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let token = match required_str(req, "token") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let display_name = match required_str(req, "displayName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match required_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(role) = LearnerRole::parse(&role) else {
        return err(&req.id, "bad_params", "role must be one of: student, parent", None);
    };
    reply(
        req,
        Some("claim"),
        roster::claim_invite(conn, &token, &email, &display_name, role, Utc::now()),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "invites.create" => Some(handle_create(state, req, actor)),
        "invites.inspect" => Some(handle_inspect(state, req)),
        "invites.claim" => Some(handle_claim(state, req)),
        _ => None,
    }
}
