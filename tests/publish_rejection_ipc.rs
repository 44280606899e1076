mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, str_at, teacher};

#[test]
fn empty_roster_blocks_publish_and_keeps_draft() {
    let mut sc = spawn_sidecar();
    sc.select_workspace("quizdesk-publish-empty-roster");
    let ws = sc.onboard("t1");
    let classroom = sc.create_classroom("t1", &ws, "Room 5A");
    let a = sc.enroll("t1", &ws, &classroom, "Ana Diaz", "ana@example.test", "student");
    let test_id = sc.ready_test("t1", &ws, &classroom);

    let removed = sc.request_ok(
        "classrooms.students.remove",
        json!({ "workspaceId": ws, "classroomId": classroom, "learnerId": a }),
        teacher("t1"),
    );
    assert_eq!(removed["status"], "inactive");

    let error = sc.request_err(
        "tests.publish",
        json!({ "workspaceId": ws, "testId": test_id }),
        teacher("t1"),
        "bad_params",
    );
    assert_eq!(
        error["message"],
        "Cannot publish test because classroom has no active students"
    );

    let board = sc.request_ok(
        "tests.attempts.list",
        json!({ "workspaceId": ws, "testId": test_id }),
        teacher("t1"),
    );
    assert_eq!(board["test"]["status"], "draft");
    assert_eq!(board["attempts"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn validation_failure_carries_the_full_checklist() {
    let mut sc = spawn_sidecar();
    sc.select_workspace("quizdesk-publish-validation");
    let ws = sc.onboard("t1");
    let classroom = sc.create_classroom("t1", &ws, "Room 5A");
    sc.enroll("t1", &ws, &classroom, "Ana Diaz", "ana@example.test", "student");

    let created = sc.request_ok(
        "tests.create",
        json!({ "workspaceId": ws, "input": { "classroomId": classroom, "title": "Bare quiz" } }),
        teacher("t1"),
    );
    let test_id = str_at(&created, &["test", "id"]);

    let error = sc.request_err(
        "tests.publish",
        json!({ "workspaceId": ws, "testId": test_id }),
        teacher("t1"),
        "validation_failed",
    );
    let validation = &error["details"]["validation"];
    assert_eq!(validation["valid"], false);
    let errors: Vec<&str> = validation["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(
        errors,
        vec![
            "Grade is required before publish.",
            "Subject is required before publish.",
            "Topic is required before publish.",
            "Learning objective is required before publish.",
            "At least one question is required before publish.",
        ]
    );
    assert_eq!(validation["warnings"][0], "Question count is 0, below target 10.");

    let bad_question = sc.request_err(
        "tests.questions.add",
        json!({
            "workspaceId": ws,
            "testId": test_id,
            "input": {
                "source": "manual",
                "type": "mcq",
                "prompt": "Pick both",
                "options": ["a", "b"],
                "correctAnswers": ["a", "b"]
            }
        }),
        teacher("t1"),
        "bad_params",
    );
    assert_eq!(
        bad_question["details"]["problems"][0],
        "MCQ questions must have exactly one correct answer."
    );
}

#[test]
fn draft_questions_can_be_removed_without_renumbering() {
    let mut sc = spawn_sidecar();
    sc.select_workspace("quizdesk-question-remove");
    let ws = sc.onboard("t1");
    let classroom = sc.create_classroom("t1", &ws, "Room 5A");
    let test_id = sc.ready_test("t1", &ws, &classroom);

    let second = sc.request_ok(
        "tests.questions.add",
        json!({
            "workspaceId": ws,
            "testId": test_id,
            "input": { "source": "manual", "type": "short_text", "prompt": "Capital of France?", "correctAnswers": ["Paris"] }
        }),
        teacher("t1"),
    );
    assert_eq!(second["question"]["position"], 2);

    let listed = sc.request_ok(
        "tests.questions.list",
        json!({ "workspaceId": ws, "testId": test_id }),
        teacher("t1"),
    );
    let first_id = str_at(&listed["questions"][0], &["id"]);
    sc.request_ok(
        "tests.questions.remove",
        json!({ "workspaceId": ws, "testId": test_id, "questionId": first_id }),
        teacher("t1"),
    );

    let listed = sc.request_ok(
        "tests.questions.list",
        json!({ "workspaceId": ws, "testId": test_id }),
        teacher("t1"),
    );
    let questions = listed["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["position"], 2);
}
