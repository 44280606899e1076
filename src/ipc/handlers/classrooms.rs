use crate::actor::Actor;
use crate::ipc::helpers::{db_conn, reply, required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use chrono::Utc;
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, Some("classrooms"), roster::list_classrooms(conn, actor, &workspace_id))
}

fn handle_create(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match required_str(req, "grade") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("classroom"),
        roster::create_classroom(conn, actor, &workspace_id, &name, &grade, Utc::now()),
    )
}

fn handle_workspace_students(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, Some("students"), roster::list_workspace_students(conn, actor, &workspace_id))
}

fn handle_students_list(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let classroom_id = match required_str(req, "classroomId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        Some("students"),
        roster::list_classroom_students(conn, actor, &workspace_id, &classroom_id),
    )
}

fn handle_students_change(
    state: &mut AppState,
    req: &Request,
    actor: Option<&Actor>,
    add: bool,
) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workspace_id = match required_str(req, "workspaceId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let classroom_id = match required_str(req, "classroomId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let learner_id = match required_str(req, "learnerId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let result = if add {
        roster::add_classroom_student(conn, actor, &workspace_id, &classroom_id, &learner_id, Utc::now())
    } else {
        roster::remove_classroom_student(conn, actor, &workspace_id, &classroom_id, &learner_id, Utc::now())
    };
    reply(
        req,
        None,
        result.map(|status| json!({ "learnerId": learner_id, "status": status })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request, actor: Option<&Actor>) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classrooms.list" => Some(handle_list(state, req, actor)),
        "classrooms.create" => Some(handle_create(state, req, actor)),
        "classrooms.workspaceStudents" => Some(handle_workspace_students(state, req, actor)),
        "classrooms.students.list" => Some(handle_students_list(state, req, actor)),
        "classrooms.students.add" => Some(handle_students_change(state, req, actor, true)),
        "classrooms.students.remove" => Some(handle_students_change(state, req, actor, false)),
        _ => None,
    }
}
