//! Publish gate and the one-way `draft -> published` transition.
//!
//! `validate_for_publish` is the single source of truth for whether a test
//! may be published: the read-only `tests.validate` call and `publish_test`
//! both run it, so a passing pre-check means publish will not be blocked by
//! content. Publishing then fans out one assignment per active student in the
//! test's classroom.

use crate::actor::Actor;
use crate::authoring::{load_test, questions_for_test, Test};
use crate::content::validate_question_content;
use crate::db::ts;
use crate::error::{CoreError, CoreResult};
use crate::roster::{active_roster, owner_of};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub question_count: i64,
    pub target_question_count: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: ValidationSummary,
}

fn missing(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Every check runs; nothing short-circuits after the test is found.
pub fn validate_for_publish(conn: &Connection, workspace_id: &str, test_id: &str) -> CoreResult<Validation> {
    let Some(test) = load_test(conn, workspace_id, test_id)? else {
        return Ok(Validation {
            valid: false,
            errors: vec!["Test not found in this workspace.".to_string()],
            warnings: Vec::new(),
            summary: ValidationSummary::default(),
        });
    };
    let questions = questions_for_test(conn, workspace_id, test_id)?;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let required = [
        (&test.grade, "Grade is required before publish."),
        (&test.classroom_id, "Classroom is required before publish."),
        (&test.subject, "Subject is required before publish."),
        (&test.topic, "Topic is required before publish."),
        (&test.objective, "Learning objective is required before publish."),
    ];
    for (field, message) in required {
        if missing(field) {
            errors.push(message.to_string());
        }
    }
    if questions.is_empty() {
        errors.push("At least one question is required before publish.".to_string());
    }
    if let (Some(starts), Some(ends)) = (test.starts_at, test.ends_at) {
        if ends < starts {
            errors.push("End time cannot be earlier than start time.".to_string());
        }
    }

    let mut total_points = 0;
    for q in &questions {
        total_points += q.points;
        for problem in validate_question_content(
            q.question_type,
            &q.prompt,
            q.options.as_deref(),
            &q.correct_answers,
        ) {
            errors.push(format!("Question {}: {}", q.id, problem));
        }
    }

    let question_count = questions.len() as i64;
    if question_count < test.question_count_target {
        warnings.push(format!(
            "Question count is {}, below target {}.",
            question_count, test.question_count_target
        ));
    }

    Ok(Validation {
        valid: errors.is_empty(),
        errors,
        warnings,
        summary: ValidationSummary {
            question_count,
            target_question_count: test.question_count_target,
            total_points,
        },
    })
}

pub fn validate_test(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
) -> CoreResult<Validation> {
    owner_of(conn, actor, workspace_id)?;
    validate_for_publish(conn, workspace_id, test_id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    /// Size of the active roster at publish time, pre-existing assignments
    /// included. It is not the number of rows this call inserted.
    pub assigned_students: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub test: Test,
    pub validation: Validation,
    pub assignment_summary: AssignmentSummary,
}

/// Inserts the missing assignments for `learners`; existing rows are left
/// alone. Returns how many rows were actually created.
pub fn fan_out_assignments(
    conn: &Connection,
    test: &Test,
    classroom_id: &str,
    learners: &[String],
    now: DateTime<Utc>,
) -> CoreResult<usize> {
    let stamp = ts(&now);
    let mut stmt = conn.prepare(
        "INSERT INTO test_assignments(
            id, test_id, workspace_id, classroom_id, learner_id, status, assigned_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, 'assigned', ?, ?)
         ON CONFLICT(test_id, learner_id) DO NOTHING",
    )?;
    let mut created = 0;
    for learner_id in learners {
        created += stmt.execute(params![
            Uuid::new_v4().to_string(),
            test.id,
            test.workspace_id,
            classroom_id,
            learner_id,
            stamp,
            stamp
        ])?;
    }
    Ok(created)
}

pub fn publish_test(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<PublishOutcome> {
    owner_of(conn, actor, workspace_id)?;

    let tx = conn.unchecked_transaction()?;
    let validation = validate_for_publish(&tx, workspace_id, test_id)?;
    if !validation.valid {
        return Err(CoreError::ValidationFailure(validation));
    }
    let test = load_test(&tx, workspace_id, test_id)?.ok_or_else(|| CoreError::not_found("Test not found"))?;
    let Some(classroom_id) = test.classroom_id.clone() else {
        return Err(CoreError::bad_request("Test classroom is required before publish"));
    };

    let roster = active_roster(&tx, workspace_id, &classroom_id)?;
    if roster.is_empty() {
        return Err(CoreError::bad_request(
            "Cannot publish test because classroom has no active students",
        ));
    }

    let stamp = ts(&now);
    tx.execute(
        "UPDATE tests
         SET status = 'published', published_at = COALESCE(published_at, ?), updated_at = ?
         WHERE id = ? AND workspace_id = ?",
        params![stamp, stamp, test_id, workspace_id],
    )?;
    let created = fan_out_assignments(&tx, &test, &classroom_id, &roster, now)?;
    let test = load_test(&tx, workspace_id, test_id)?.ok_or_else(|| CoreError::not_found("Test not found"))?;
    tx.commit()?;

    info!(
        %test_id,
        roster = roster.len(),
        created,
        "test published"
    );
    Ok(PublishOutcome {
        test,
        validation,
        assignment_summary: AssignmentSummary {
            assigned_students: roster.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authoring::fixtures::{ready_draft, two_plus_two};
    use crate::authoring::{add_question, create_test, list_questions, NewQuestion, NewTest};
    use crate::model::{LearnerRole, QuestionType, TestStatus};
    use crate::roster::fixtures::{seed, t0};
    use crate::roster::remove_classroom_student;

    fn assignment_count(conn: &Connection, test_id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM test_assignments WHERE test_id = ?",
            [test_id],
            |r| r.get(0),
        )
        .expect("count")
    }

    #[test]
    fn missing_test_is_reported_not_raised() {
        let s = seed();
        let v = validate_for_publish(&s.conn, &s.workspace_id, "nope").expect("validate");
        assert!(!v.valid);
        assert_eq!(v.errors, vec!["Test not found in this workspace."]);
        assert_eq!(v.summary, ValidationSummary::default());
    }

    #[test]
    fn every_problem_is_listed_at_once() {
        let s = seed();
        let draft = NewTest {
            starts_at: Some(t0()),
            ..NewTest::titled(&s.classroom_id, "Bare")
        };
        let test = create_test(&s.conn, Some(&s.teacher), &s.workspace_id, draft, t0()).expect("create");
        // Push an inverted window past the create-time check.
        s.conn
            .execute(
                "UPDATE tests SET ends_at = '2026-02-01T00:00:00.000Z' WHERE id = ?",
                [&test.id],
            )
            .expect("invert window");

        let v = validate_test(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id).expect("validate");
        assert_eq!(
            v.errors,
            vec![
                "Grade is required before publish.",
                "Subject is required before publish.",
                "Topic is required before publish.",
                "Learning objective is required before publish.",
                "At least one question is required before publish.",
                "End time cannot be earlier than start time.",
            ]
        );
        assert_eq!(v.warnings, vec!["Question count is 0, below target 10."]);
    }

    #[test]
    fn stored_mcq_with_two_answers_blocks_publish() {
        let s = seed();
        let test = s.ready_test();
        s.conn
            .execute(
                "UPDATE test_questions SET correct_answers_json = '[\"3\",\"4\"]' WHERE test_id = ?",
                [&test.id],
            )
            .expect("corrupt");
        let v = validate_for_publish(&s.conn, &s.workspace_id, &test.id).expect("validate");
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 1);
        assert!(v.errors[0].ends_with("MCQ questions must have exactly one correct answer."));

        s.enroll("Ana Diaz", LearnerRole::Student);
        match publish_test(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, t0()) {
            Err(CoreError::ValidationFailure(failed)) => assert_eq!(failed, v),
            other => panic!("unexpected {:?}", other.map(|o| o.test.id)),
        }
    }

    #[test]
    fn points_are_summed() {
        let s = seed();
        let test = s.ready_test();
        let mut q = NewQuestion::manual(QuestionType::ShortText, "Capital of France?", &[], &["Paris"]);
        q.points = Some(4);
        add_question(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, q, t0()).expect("add");
        let v = validate_for_publish(&s.conn, &s.workspace_id, &test.id).expect("validate");
        assert!(v.valid);
        assert!(v.warnings.is_empty());
        assert_eq!(v.summary.total_points, 5);
        assert_eq!(v.summary.question_count, 2);
    }

    #[test]
    fn publish_assigns_students_only_and_freezes_questions() {
        let s = seed();
        let test = s.ready_test();
        s.enroll("Ana Diaz", LearnerRole::Student);
        s.enroll("Ben Ode", LearnerRole::Student);
        s.enroll("Pat Parent", LearnerRole::Parent);

        let before = list_questions(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id).expect("before");
        let out = publish_test(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, t0()).expect("publish");
        assert_eq!(out.test.status, TestStatus::Published);
        assert_eq!(out.test.published_at, Some(t0()));
        assert_eq!(out.assignment_summary.assigned_students, 2);
        assert_eq!(assignment_count(&s.conn, &test.id), 2);

        let e = add_question(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, two_plus_two(), t0())
            .unwrap_err();
        assert!(matches!(e, CoreError::Conflict(_)));
        let after = list_questions(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id).expect("after");
        assert_eq!(before, after);
    }

    #[test]
    fn fan_out_twice_does_not_duplicate() {
        let s = seed();
        let test = s.ready_test();
        s.enroll("Ana Diaz", LearnerRole::Student);
        s.enroll("Ben Ode", LearnerRole::Student);
        let roster = active_roster(&s.conn, &s.workspace_id, &s.classroom_id).expect("roster");

        let first = fan_out_assignments(&s.conn, &test, &s.classroom_id, &roster, t0()).expect("first");
        let second = fan_out_assignments(&s.conn, &test, &s.classroom_id, &roster, t0()).expect("second");
        assert_eq!((first, second), (2, 0));
        assert_eq!(assignment_count(&s.conn, &test.id), 2);

        let again = publish_test(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, t0()).expect("publish");
        assert_eq!(again.assignment_summary.assigned_students, 2);
        assert_eq!(assignment_count(&s.conn, &test.id), 2);
    }

    #[test]
    fn empty_roster_leaves_test_in_draft() {
        let s = seed();
        let learner = s.enroll("Ana Diaz", LearnerRole::Student);
        remove_classroom_student(&s.conn, Some(&s.teacher), &s.workspace_id, &s.classroom_id, &learner, t0())
            .expect("remove");
        let test = create_test(&s.conn, Some(&s.teacher), &s.workspace_id, ready_draft(&s.classroom_id), t0())
            .expect("create");
        add_question(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, two_plus_two(), t0()).expect("add");

        let e = publish_test(&s.conn, Some(&s.teacher), &s.workspace_id, &test.id, t0()).unwrap_err();
        assert!(matches!(e, CoreError::BadRequest { .. }));
        assert_eq!(assignment_count(&s.conn, &test.id), 0);
        let status = load_test(&s.conn, &s.workspace_id, &test.id).expect("load").expect("row").status;
        assert_eq!(status, TestStatus::Draft);
    }
}
