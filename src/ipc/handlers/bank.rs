use crate::actor::Actor;
use crate::bank::{self, BankFilters, NewBankItem};
use crate::ipc::helpers::{db_conn, payload, reply, required_str};
use crate::ipc::types::{AppState, Request};
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
    let input: NewBankItem = match payload(req, "input") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("question"),
        bank::create_bank_item(conn, actor, &workspace_id, input, Utc::now()),
    )
}

fn handle_list(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters: BankFilters = match payload(req, "filters") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("questions"),
        bank::list_bank_items(conn, actor, &workspace_id, &filters),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "bank.create" => Some(handle_create(state, req, actor)),
        "bank.list" => Some(handle_list(state, req, actor)),
        _ => None,
    }
}
