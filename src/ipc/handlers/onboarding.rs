use crate::actor::Actor;
use crate::ipc::error::err;
use crate::ipc::helpers::{db_conn, reply};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use chrono::Utc;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeacherProfileInput {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    grade_levels: Vec<String>,
}

fn handle_save(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input: TeacherProfileInput = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid params: {}", e), None),
    };
    reply(
        req,
        Some("workspace"),
        roster::onboard_teacher(conn, actor, &input.display_name, &input.grade_levels, Utc::now()),
    )
}

fn handle_get(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    reply(req, Some("workspace"), roster::teacher_workspace(conn, actor))
}

pub fn try_handle(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "onboarding.teacher.save" => Some(handle_save(state, req, actor)),
        "onboarding.teacher.get" => Some(handle_get(state, req, actor)),
        _ => None,
    }
}
