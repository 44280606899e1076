mod test_support;

use serde_json::{json, Value};
use test_support::{spawn_sidecar, teacher};

const METHODS: &[&str] = &[
    "onboarding.teacher.save",
    "onboarding.teacher.get",
    "classrooms.list",
    "classrooms.create",
    "classrooms.workspaceStudents",
    "classrooms.students.list",
    "classrooms.students.add",
    "classrooms.students.remove",
    "invites.create",
    "invites.inspect",
    "invites.claim",
    "bank.create",
    "bank.list",
    "tests.create",
    "tests.teacherList",
    "tests.questions.add",
    "tests.questions.list",
    "tests.questions.remove",
    "tests.validate",
    "tests.publish",
    "tests.attempts.list",
    "tests.attempts.regrade",
    "tests.learnerList",
    "tests.start",
    "tests.submit",
    "tests.public.get",
    "tests.public.start",
    "tests.public.submit",
];

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let mut sc = spawn_sidecar();

    let health = sc.request_ok("health", json!({}), Value::Null);
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    // Every family answers before a workspace exists, with no_workspace.
    for method in METHODS {
        sc.request_err(method, json!({}), teacher("t1"), "no_workspace");
    }

    sc.select_workspace("quizdesk-router-smoke");
    for method in METHODS {
        let resp = sc.request(method, json!({}), teacher("t1"));
        let code = resp
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        assert_ne!(code, "not_implemented", "{} is not routed", method);
    }

    sc.request_err("nope.method", json!({}), Value::Null, "not_implemented");
}

#[test]
fn malformed_lines_and_actors_are_rejected() {
    let mut sc = spawn_sidecar();

    let resp = sc.send_raw("{not json");
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");

    sc.select_workspace("quizdesk-router-actor");
    sc.request_err(
        "classrooms.list",
        json!({ "workspaceId": "w" }),
        json!({ "userId": "t1", "learnerId": "l1", "role": "student" }),
        "unauthorized",
    );
    sc.request_err(
        "classrooms.list",
        json!({ "workspaceId": "w" }),
        json!({ "learnerId": "l1" }),
        "unauthorized",
    );
    sc.request_err("onboarding.teacher.get", json!({}), Value::Null, "unauthorized");
    sc.request_err("onboarding.teacher.get", json!({}), teacher("t1"), "not_found");

    let health = sc.request_ok("health", json!({}), Value::Null);
    assert!(health["workspacePath"].as_str().is_some());
}
