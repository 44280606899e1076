//! Learner-facing and public (link-shared) test taking.

use crate::actor::Actor;
use crate::attempts;
use crate::ipc::helpers::{db_conn, optional_f64, reply, required_str};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;

fn handle_learner_list(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("tests"),
        attempts::list_tests_for_learner(conn, actor, &workspace_id, Utc::now()),
    )
}

fn handle_start(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("attempt"),
        attempts::start_attempt(conn, actor, &workspace_id, &test_id, Utc::now()),
    )
}

fn handle_submit(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match optional_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("attempt"),
        attempts::submit_attempt(conn, actor, &workspace_id, &test_id, score, Utc::now()),
    )
}

fn handle_public_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, Some("test"), attempts::public_test_info(conn, &test_id))
}

fn handle_public_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let child_name = match required_str(req, "childName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("attempt"),
        attempts::public_start(conn, &test_id, &child_name, Utc::now()),
    )
}

fn handle_public_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let test_id = match required_str(req, "testId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let attempt_id = match required_str(req, "attemptId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match optional_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("attempt"),
        attempts::public_submit(conn, &test_id, &attempt_id, score, Utc::now()),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tests.learnerList" => Some(handle_learner_list(state, req, actor)),
        "tests.start" => Some(handle_start(state, req, actor)),
        "tests.submit" => Some(handle_submit(state, req, actor)),
        "tests.public.get" => Some(handle_public_get(state, req)),
        "tests.public.start" => Some(handle_public_start(state, req)),
        "tests.public.submit" => Some(handle_public_submit(state, req)),
        _ => None,
    }
}
