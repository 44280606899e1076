//! Per-learner attempt lifecycle: `assigned -> started -> submitted`.
//!
//! Two entry points reach the same transitions. The authenticated path is
//! gated by the learner's workspace link and assignment. The public path
//! matches a typed child name against the test's assigned learners and then
//! trusts possession of the attempt id for submission.

use crate::actor::{require_learner, Actor};
use crate::authoring::{load_test, test_from_row, Test, TEST_COLUMNS, TEST_COLUMN_COUNT};
use crate::db::{ts, ts_col, ts_col_required};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::model::{AssignmentStatus, AttemptStatus, LearnerRole, TestStatus};
use crate::roster::{ensure_learner_access, owner_of};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub test_id: String,
    pub learner_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<String>,
}

const ATTEMPT_COLUMNS: &str = "id, test_id, learner_id, status, started_at, submitted_at, score";

fn attempt_from_row(r: &Row<'_>) -> rusqlite::Result<Attempt> {
    Ok(Attempt {
        id: r.get(0)?,
        test_id: r.get(1)?,
        learner_id: r.get(2)?,
        status: r.get(3)?,
        started_at: ts_col_required(r, 4)?,
        submitted_at: ts_col(r, 5)?,
        score: r.get(6)?,
    })
}

/// Open-ended bounds are unbounded; both ends are inclusive.
pub fn within_window(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    starts_at.map_or(true, |s| now >= s) && ends_at.map_or(true, |e| now <= e)
}

/// Validates a 0-100 score and renders it as the shortest decimal text.
pub fn score_text(score: Option<f64>) -> CoreResult<Option<String>> {
    match score {
        None => Ok(None),
        // Adding zero folds -0.0 into 0.0 so it never renders as "-0".
        Some(v) if v.is_finite() && (0.0..=100.0).contains(&v) => Ok(Some(format!("{}", v + 0.0))),
        Some(_) => Err(CoreError::bad_request("score must be between 0 and 100")),
    }
}

pub fn normalize_person_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn find_attempt(conn: &Connection, test_id: &str, workspace_id: &str, learner_id: &str) -> CoreResult<Option<Attempt>> {
    let sql = format!(
        "SELECT {} FROM test_attempts WHERE test_id = ? AND workspace_id = ? AND learner_id = ?",
        ATTEMPT_COLUMNS
    );
    let attempt = conn
        .query_row(&sql, params![test_id, workspace_id, learner_id], attempt_from_row)
        .optional()?;
    Ok(attempt)
}

fn assignment_id(conn: &Connection, test_id: &str, workspace_id: &str, learner_id: &str) -> CoreResult<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM test_assignments WHERE test_id = ? AND workspace_id = ? AND learner_id = ?",
            params![test_id, workspace_id, learner_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

fn set_assignment_status(
    conn: &Connection,
    test_id: &str,
    workspace_id: &str,
    learner_id: &str,
    status: AssignmentStatus,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    conn.execute(
        "UPDATE test_assignments SET status = ?, updated_at = ?
         WHERE test_id = ? AND workspace_id = ? AND learner_id = ?",
        params![status, ts(&now), test_id, workspace_id, learner_id],
    )?;
    Ok(())
}

/// Idempotent: an existing attempt for (test, workspace, learner) is returned
/// unchanged. The unique constraint settles a race between two first starts.
fn begin_attempt(
    conn: &Connection,
    test: &Test,
    learner_id: &str,
    role: LearnerRole,
    now: DateTime<Utc>,
) -> CoreResult<Attempt> {
    if let Some(existing) = find_attempt(conn, &test.id, &test.workspace_id, learner_id)? {
        return Ok(existing);
    }

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        test_id: test.id.clone(),
        learner_id: learner_id.to_string(),
        status: AttemptStatus::Started,
        started_at: now,
        submitted_at: None,
        score: None,
    };
    let stamp = ts(&now);
    let tx = conn.unchecked_transaction()?;
    let inserted = tx.execute(
        "INSERT INTO test_attempts(
            id, test_id, workspace_id, learner_id, role, status, started_at, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            attempt.id,
            attempt.test_id,
            test.workspace_id,
            learner_id,
            role,
            attempt.status,
            stamp,
            stamp,
            stamp
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            drop(tx);
            return find_attempt(conn, &test.id, &test.workspace_id, learner_id)?
                .ok_or_else(|| CoreError::conflict("Attempt already exists"));
        }
        Err(e) => return Err(e.into()),
    }
    set_assignment_status(&tx, &test.id, &test.workspace_id, learner_id, AssignmentStatus::Started, now)?;
    tx.commit()?;
    info!(test_id = %test.id, %learner_id, attempt_id = %attempt.id, "attempt started");
    Ok(attempt)
}

fn finish_attempt(
    conn: &Connection,
    workspace_id: &str,
    attempt: Attempt,
    score: Option<String>,
    now: DateTime<Utc>,
) -> CoreResult<Attempt> {
    if attempt.status == AttemptStatus::Submitted {
        return Err(CoreError::conflict("Attempt has already been submitted"));
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE test_attempts SET status = 'submitted', submitted_at = ?, score = ?, updated_at = ?
         WHERE id = ?",
        params![ts(&now), score, ts(&now), attempt.id],
    )?;
    set_assignment_status(
        &tx,
        &attempt.test_id,
        workspace_id,
        &attempt.learner_id,
        AssignmentStatus::Submitted,
        now,
    )?;
    tx.commit()?;
    info!(attempt_id = %attempt.id, score = score.as_deref().unwrap_or("-"), "attempt submitted");
    Ok(Attempt {
        status: AttemptStatus::Submitted,
        submitted_at: Some(now),
        score,
        ..attempt
    })
}

/// Role first, then the workspace link, then the assignment.
fn authorize_student<'a>(
    conn: &Connection,
    actor: Option<&'a Actor>,
    workspace_id: &str,
    test_id: &str,
    verb: &str,
) -> CoreResult<&'a str> {
    let (learner_id, role) = require_learner(actor)?;
    if role != LearnerRole::Student {
        return Err(CoreError::forbidden(format!("Only student accounts can {} tests", verb)));
    }
    ensure_learner_access(conn, workspace_id, learner_id, role)?;
    if assignment_id(conn, test_id, workspace_id, learner_id)?.is_none() {
        return Err(CoreError::forbidden("Test is not assigned to this learner"));
    }
    Ok(learner_id)
}

pub fn start_attempt(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Attempt> {
    let learner_id = authorize_student(conn, actor, workspace_id, test_id, "start")?;
    let test = load_test(conn, workspace_id, test_id)?.ok_or_else(|| CoreError::not_found("Test not found"))?;
    if test.status != TestStatus::Published {
        return Err(CoreError::conflict("Test is not published yet"));
    }
    if !within_window(test.starts_at, test.ends_at, now) {
        return Err(CoreError::conflict("Test is outside active time window"));
    }
    begin_attempt(conn, &test, learner_id, LearnerRole::Student, now)
}

pub fn submit_attempt(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
    score: Option<f64>,
    now: DateTime<Utc>,
) -> CoreResult<Attempt> {
    let score = score_text(score)?;
    let learner_id = authorize_student(conn, actor, workspace_id, test_id, "submit")?;
    let attempt = find_attempt(conn, test_id, workspace_id, learner_id)?
        .ok_or_else(|| CoreError::not_found("No active attempt found for this learner"))?;
    finish_attempt(conn, workspace_id, attempt, score, now)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTest {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TestStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub classroom_name: Option<String>,
}

/// Looks a test up by id alone; drafts are indistinguishable from missing.
fn load_published(conn: &Connection, test_id: &str) -> CoreResult<(Test, Option<String>)> {
    let sql = format!(
        "SELECT {}, c.name FROM tests t
         LEFT JOIN classrooms c ON c.id = t.classroom_id
         WHERE t.id = ?",
        TEST_COLUMNS
    );
    let row = conn
        .query_row(&sql, [test_id], |r| {
            Ok((test_from_row(r)?, r.get::<_, Option<String>>(TEST_COLUMN_COUNT)?))
        })
        .optional()?;
    match row {
        Some((test, classroom)) if test.status == TestStatus::Published => Ok((test, classroom)),
        _ => Err(CoreError::not_found("Test not found")),
    }
}

pub fn public_test_info(conn: &Connection, test_id: &str) -> CoreResult<PublicTest> {
    let (test, classroom_name) = load_published(conn, test_id)?;
    Ok(PublicTest {
        id: test.id,
        title: test.title,
        description: test.description,
        status: test.status,
        starts_at: test.starts_at,
        ends_at: test.ends_at,
        classroom_name,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAttempt {
    pub id: String,
    pub status: AttemptStatus,
    pub child_name: String,
}

pub fn public_start(conn: &Connection, test_id: &str, child_name: &str, now: DateTime<Utc>) -> CoreResult<PublicAttempt> {
    let typed = child_name.trim();
    if !(2..=120).contains(&typed.chars().count()) {
        return Err(CoreError::bad_request("childName must be between 2 and 120 characters"));
    }
    let (test, _) = load_published(conn, test_id)?;
    if !within_window(test.starts_at, test.ends_at, now) {
        return Err(CoreError::conflict("Test is outside active time window"));
    }

    let target = normalize_person_name(typed);
    let mut stmt = conn.prepare(
        "SELECT la.id, la.display_name
         FROM test_assignments ta
         JOIN learner_accounts la ON la.id = ta.learner_id
         WHERE ta.test_id = ? AND ta.workspace_id = ?",
    )?;
    let matching: Vec<(String, String)> = stmt
        .query_map(params![test.id, test.workspace_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(_, name)| normalize_person_name(name) == target)
        .collect();

    let (learner_id, display_name) = match matching.as_slice() {
        [] => return Err(CoreError::not_found("Child name not found for this test")),
        [one] => one.clone(),
        _ => {
            return Err(CoreError::conflict(
                "Multiple students share this name. Ask teacher for direct help.",
            ))
        }
    };

    let attempt = begin_attempt(conn, &test, &learner_id, LearnerRole::Student, now)?;
    Ok(PublicAttempt {
        id: attempt.id,
        status: attempt.status,
        child_name: display_name,
    })
}

/// The attempt id is the only credential on this path.
pub fn public_submit(
    conn: &Connection,
    test_id: &str,
    attempt_id: &str,
    score: Option<f64>,
    now: DateTime<Utc>,
) -> CoreResult<Attempt> {
    let score = score_text(score)?;
    let sql = format!(
        "SELECT {}, workspace_id FROM test_attempts WHERE id = ? AND test_id = ?",
        ATTEMPT_COLUMNS
    );
    let found = conn
        .query_row(&sql, params![attempt_id, test_id], |r| {
            Ok((attempt_from_row(r)?, r.get::<_, String>(7)?))
        })
        .optional()?;
    let Some((attempt, workspace_id)) = found else {
        return Err(CoreError::not_found("Attempt not found"));
    };
    finish_attempt(conn, &workspace_id, attempt, score, now)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerTest {
    pub id: String,
    pub classroom_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub grade: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub objective: Option<String>,
    pub max_score: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub can_start: bool,
    pub attempt: Option<Attempt>,
}

/// Published tests assigned to the calling learner, oldest first. Parents see
/// the same list but can never start.
pub fn list_tests_for_learner(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Vec<LearnerTest>> {
    let (learner_id, role) = require_learner(actor)?;
    ensure_learner_access(conn, workspace_id, learner_id, role)?;

    let sql = format!(
        "SELECT {} FROM test_assignments ta
         JOIN tests t ON t.id = ta.test_id
         WHERE ta.workspace_id = ? AND ta.learner_id = ?
           AND t.workspace_id = ? AND t.status = 'published'
         ORDER BY t.created_at, t.rowid",
        TEST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tests = stmt
        .query_map(params![workspace_id, learner_id, workspace_id], test_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let sql = format!(
        "SELECT {} FROM test_attempts WHERE workspace_id = ? AND learner_id = ?",
        ATTEMPT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut attempts: HashMap<String, Attempt> = stmt
        .query_map(params![workspace_id, learner_id], attempt_from_row)?
        .map(|a| a.map(|a| (a.test_id.clone(), a)))
        .collect::<Result<_, _>>()?;

    Ok(tests
        .into_iter()
        .map(|t| LearnerTest {
            can_start: role == LearnerRole::Student && within_window(t.starts_at, t.ends_at, now),
            attempt: attempts.remove(&t.id),
            id: t.id,
            classroom_id: t.classroom_id,
            title: t.title,
            description: t.description,
            grade: t.grade,
            subject: t.subject,
            topic: t.topic,
            objective: t.objective,
            max_score: t.max_score,
            starts_at: t.starts_at,
            ends_at: t.ends_at,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptTestHeader {
    pub id: String,
    pub title: String,
    pub status: TestStatus,
    pub classroom_id: Option<String>,
    pub classroom_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRow {
    pub assignment_id: String,
    pub learner_id: String,
    pub child_name: String,
    pub child_email: String,
    pub assignment_status: AssignmentStatus,
    pub attempt_id: Option<String>,
    pub attempt_status: Option<AttemptStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestAttempts {
    pub test: AttemptTestHeader,
    pub attempts: Vec<AttemptRow>,
}

/// One row per assignment, including learners who never started.
pub fn list_attempts_for_teacher(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
) -> CoreResult<TestAttempts> {
    owner_of(conn, actor, workspace_id)?;
    let header = conn
        .query_row(
            "SELECT t.id, t.title, t.status, t.classroom_id, c.name
             FROM tests t
             LEFT JOIN classrooms c ON c.id = t.classroom_id
             WHERE t.id = ? AND t.workspace_id = ?",
            params![test_id, workspace_id],
            |r| {
                Ok(AttemptTestHeader {
                    id: r.get(0)?,
                    title: r.get(1)?,
                    status: r.get(2)?,
                    classroom_id: r.get(3)?,
                    classroom_name: r.get(4)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("Test not found"))?;

    let mut stmt = conn.prepare(
        "SELECT ta.id, la.id, la.display_name, la.email, ta.status,
                at.id, at.status, at.started_at, at.submitted_at, at.score
         FROM test_assignments ta
         JOIN learner_accounts la ON la.id = ta.learner_id
         LEFT JOIN test_attempts at
           ON at.test_id = ta.test_id
          AND at.workspace_id = ta.workspace_id
          AND at.learner_id = ta.learner_id
         WHERE ta.test_id = ? AND ta.workspace_id = ?
         ORDER BY la.display_name",
    )?;
    let attempts = stmt
        .query_map(params![test_id, workspace_id], |r| {
            Ok(AttemptRow {
                assignment_id: r.get(0)?,
                learner_id: r.get(1)?,
                child_name: r.get(2)?,
                child_email: r.get(3)?,
                assignment_status: r.get(4)?,
                attempt_id: r.get(5)?,
                attempt_status: r.get(6)?,
                started_at: ts_col(r, 7)?,
                submitted_at: ts_col(r, 8)?,
                score: r.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TestAttempts {
        test: header,
        attempts,
    })
}

/// Teacher-only score correction on a submitted attempt. `submitted_at` is
/// kept as the learner's original submission time.
pub fn regrade_attempt(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
    attempt_id: &str,
    score: f64,
    now: DateTime<Utc>,
) -> CoreResult<Attempt> {
    owner_of(conn, actor, workspace_id)?;
    let score = score_text(Some(score))?;
    let sql = format!(
        "SELECT {} FROM test_attempts WHERE id = ? AND test_id = ? AND workspace_id = ?",
        ATTEMPT_COLUMNS
    );
    let attempt = conn
        .query_row(&sql, params![attempt_id, test_id, workspace_id], attempt_from_row)
        .optional()?
        .ok_or_else(|| CoreError::not_found("Attempt not found"))?;
    if attempt.status != AttemptStatus::Submitted {
        return Err(CoreError::conflict("Only submitted attempts can be regraded"));
    }
    conn.execute(
        "UPDATE test_attempts SET score = ?, updated_at = ? WHERE id = ?",
        params![score, ts(&now), attempt.id],
    )?;
    info!(%attempt_id, score = score.as_deref().unwrap_or("-"), "attempt regraded");
    Ok(Attempt { score, ..attempt })
}
