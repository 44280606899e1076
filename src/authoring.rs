//! Draft tests and their ordered question lists.

use crate::actor::Actor;
use crate::bank::load_bank_item;
use crate::content::{normalize_answers, normalize_options, validate_question_content};
use crate::db::{json_list, json_list_col, ts, ts_col, ts_col_required};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::model::{Difficulty, FeedbackMode, QuestionType, SourceType, TestStatus};
use crate::roster::{classroom_exists, owner_of};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTest {
    pub classroom_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub question_count_target: Option<i64>,
    #[serde(default)]
    pub time_limit_mins: Option<i64>,
    #[serde(default)]
    pub attempt_limit: Option<i64>,
    #[serde(default)]
    pub feedback_mode: Option<FeedbackMode>,
    #[serde(default)]
    pub shuffle_questions: Option<bool>,
    #[serde(default)]
    pub shuffle_options: Option<bool>,
    #[serde(default)]
    pub max_score: Option<i64>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl NewTest {
    fn check_bounds(&self) -> Vec<String> {
        fn range(problems: &mut Vec<String>, name: &str, v: Option<i64>, lo: i64, hi: i64) {
            if let Some(v) = v {
                if !(lo..=hi).contains(&v) {
                    problems.push(format!("{} must be between {} and {}", name, lo, hi));
                }
            }
        }
        let mut problems = Vec::new();
        let title_len = self.title.trim().chars().count();
        if !(2..=160).contains(&title_len) {
            problems.push("title must be between 2 and 160 characters".to_string());
        }
        range(&mut problems, "questionCountTarget", self.question_count_target, 1, 100);
        range(&mut problems, "timeLimitMins", self.time_limit_mins, 1, 300);
        range(&mut problems, "attemptLimit", self.attempt_limit, 1, 10);
        range(&mut problems, "maxScore", self.max_score, 1, 1000);
        problems
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub workspace_id: String,
    pub classroom_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub grade: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub objective: Option<String>,
    pub status: TestStatus,
    pub question_count_target: i64,
    pub time_limit_mins: Option<i64>,
    pub attempt_limit: i64,
    pub feedback_mode: FeedbackMode,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub max_score: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const TEST_COLUMNS: &str = "t.id, t.workspace_id, t.classroom_id, t.title, t.description, t.grade,
    t.subject, t.topic, t.objective, t.status, t.question_count_target, t.time_limit_mins,
    t.attempt_limit, t.feedback_mode, t.shuffle_questions, t.shuffle_options, t.max_score,
    t.starts_at, t.ends_at, t.published_at, t.created_at";

/// Number of columns in `TEST_COLUMNS`; joined queries append after it.
pub const TEST_COLUMN_COUNT: usize = 21;

pub fn test_from_row(r: &Row<'_>) -> rusqlite::Result<Test> {
    Ok(Test {
        id: r.get(0)?,
        workspace_id: r.get(1)?,
        classroom_id: r.get(2)?,
        title: r.get(3)?,
        description: r.get(4)?,
        grade: r.get(5)?,
        subject: r.get(6)?,
        topic: r.get(7)?,
        objective: r.get(8)?,
        status: r.get(9)?,
        question_count_target: r.get(10)?,
        time_limit_mins: r.get(11)?,
        attempt_limit: r.get(12)?,
        feedback_mode: r.get(13)?,
        shuffle_questions: r.get(14)?,
        shuffle_options: r.get(15)?,
        max_score: r.get(16)?,
        starts_at: ts_col(r, 17)?,
        ends_at: ts_col(r, 18)?,
        published_at: ts_col(r, 19)?,
        created_at: ts_col_required(r, 20)?,
    })
}

pub fn load_test(conn: &Connection, workspace_id: &str, test_id: &str) -> CoreResult<Option<Test>> {
    let sql = format!(
        "SELECT {} FROM tests t WHERE t.id = ? AND t.workspace_id = ?",
        TEST_COLUMNS
    );
    let test = conn
        .query_row(&sql, params![test_id, workspace_id], test_from_row)
        .optional()?;
    Ok(test)
}

fn require_test(conn: &Connection, workspace_id: &str, test_id: &str) -> CoreResult<Test> {
    load_test(conn, workspace_id, test_id)?.ok_or_else(|| CoreError::not_found("Test not found"))
}

fn clean(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn create_test(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    draft: NewTest,
    now: DateTime<Utc>,
) -> CoreResult<Test> {
    let user_id = owner_of(conn, actor, workspace_id)?;

    let problems = draft.check_bounds();
    if !problems.is_empty() {
        return Err(CoreError::BadRequest {
            message: "Test details are invalid.".to_string(),
            problems,
        });
    }
    if !classroom_exists(conn, workspace_id, &draft.classroom_id)? {
        return Err(CoreError::bad_request("Classroom not found in this workspace"));
    }
    if let (Some(starts), Some(ends)) = (draft.starts_at, draft.ends_at) {
        if ends < starts {
            return Err(CoreError::bad_request("endsAt cannot be earlier than startsAt"));
        }
    }

    let test = Test {
        id: Uuid::new_v4().to_string(),
        workspace_id: workspace_id.to_string(),
        classroom_id: Some(draft.classroom_id),
        title: draft.title.trim().to_string(),
        description: clean(draft.description),
        grade: clean(draft.grade),
        subject: clean(draft.subject),
        topic: clean(draft.topic),
        objective: clean(draft.objective),
        status: TestStatus::Draft,
        question_count_target: draft.question_count_target.unwrap_or(10),
        time_limit_mins: draft.time_limit_mins,
        attempt_limit: draft.attempt_limit.unwrap_or(1),
        feedback_mode: draft.feedback_mode.unwrap_or(FeedbackMode::AfterSubmission),
        shuffle_questions: draft.shuffle_questions.unwrap_or(true),
        shuffle_options: draft.shuffle_options.unwrap_or(true),
        max_score: draft.max_score.unwrap_or(100),
        starts_at: draft.starts_at,
        ends_at: draft.ends_at,
        published_at: None,
        created_at: now,
    };

    let stamp = ts(&now);
    conn.execute(
        "INSERT INTO tests(
            id, workspace_id, classroom_id, title, description, grade, subject, topic, objective,
            status, question_count_target, time_limit_mins, attempt_limit, feedback_mode,
            shuffle_questions, shuffle_options, max_score, starts_at, ends_at,
            created_by_user_id, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            test.id,
            test.workspace_id,
            test.classroom_id,
            test.title,
            test.description,
            test.grade,
            test.subject,
            test.topic,
            test.objective,
            test.status,
            test.question_count_target,
            test.time_limit_mins,
            test.attempt_limit,
            test.feedback_mode,
            test.shuffle_questions,
            test.shuffle_options,
            test.max_score,
            test.starts_at.as_ref().map(ts),
            test.ends_at.as_ref().map(ts),
            user_id,
            stamp,
            stamp
        ],
    )?;
    Ok(test)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherTestRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TestStatus,
    pub classroom_id: Option<String>,
    pub classroom_name: Option<String>,
    pub classroom_grade: Option<String>,
    pub question_count_target: i64,
    pub created_at: DateTime<Utc>,
}

pub fn list_tests_for_teacher(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
) -> CoreResult<Vec<TeacherTestRow>> {
    owner_of(conn, actor, workspace_id)?;
    let mut stmt = conn.prepare(
        "SELECT t.id, t.title, t.description, t.status, t.classroom_id, c.name, c.grade,
                t.question_count_target, t.created_at
         FROM tests t
         LEFT JOIN classrooms c ON c.id = t.classroom_id
         WHERE t.workspace_id = ?
         ORDER BY t.created_at DESC, t.rowid DESC",
    )?;
    let rows = stmt
        .query_map([workspace_id], |r| {
            Ok(TeacherTestRow {
                id: r.get(0)?,
                title: r.get(1)?,
                description: r.get(2)?,
                status: r.get(3)?,
                classroom_id: r.get(4)?,
                classroom_name: r.get(5)?,
                classroom_grade: r.get(6)?,
                question_count_target: r.get(7)?,
                created_at: ts_col_required(r, 8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A question to add. `source = bank` copies content from the referenced
/// bank item and ignores the content fields here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub source: SourceType,
    #[serde(default)]
    pub question_bank_item_id: Option<String>,
    #[serde(default, rename = "type")]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answers: Option<Vec<String>>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestQuestion {
    pub id: String,
    pub test_id: String,
    pub question_bank_item_id: Option<String>,
    pub source_type: SourceType,
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub correct_answers: Vec<String>,
    pub explanation: Option<String>,
    pub difficulty: Difficulty,
    pub skill: Option<String>,
    pub points: i64,
    pub position: i64,
}

fn next_position(conn: &Connection, test_id: &str) -> CoreResult<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(position) FROM test_questions WHERE test_id = ?",
        [test_id],
        |r| r.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

pub fn add_question(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
    payload: NewQuestion,
    now: DateTime<Utc>,
) -> CoreResult<TestQuestion> {
    let user_id = owner_of(conn, actor, workspace_id)?;
    let test = require_test(conn, workspace_id, test_id)?;
    if test.status == TestStatus::Published {
        return Err(CoreError::conflict("Cannot modify questions for a published test"));
    }

    let mut problems = Vec::new();
    if let Some(points) = payload.points {
        if !(1..=100).contains(&points) {
            problems.push("points must be between 1 and 100".to_string());
        }
    }
    if let Some(position) = payload.position {
        if !(1..=500).contains(&position) {
            problems.push("position must be between 1 and 500".to_string());
        }
    }
    if !problems.is_empty() {
        return Err(CoreError::BadRequest {
            message: "Question placement is invalid.".to_string(),
            problems,
        });
    }

    let position = match payload.position {
        Some(p) => p,
        None => next_position(conn, test_id)?,
    };
    let points = payload.points.unwrap_or(1);

    let question = match payload.source {
        SourceType::Bank => {
            let item_id = payload
                .question_bank_item_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| CoreError::bad_request("questionBankItemId is required for bank source"))?;
            let item = load_bank_item(conn, workspace_id, item_id)?
                .ok_or_else(|| CoreError::not_found("Question bank item not found"))?;
            TestQuestion {
                id: Uuid::new_v4().to_string(),
                test_id: test_id.to_string(),
                question_bank_item_id: Some(item.id),
                source_type: SourceType::Bank,
                question_type: item.question_type,
                prompt: item.prompt,
                options: item.options,
                correct_answers: item.correct_answers,
                explanation: item.explanation,
                difficulty: item.difficulty,
                skill: Some(item.skill),
                points,
                position,
            }
        }
        SourceType::Manual => {
            let (Some(question_type), Some(prompt), Some(answers)) =
                (payload.question_type, payload.prompt, payload.correct_answers)
            else {
                return Err(CoreError::bad_request(
                    "Manual question requires type, prompt, and correctAnswers.",
                ));
            };
            let options = normalize_options(payload.options.as_deref());
            let errors = validate_question_content(question_type, &prompt, options.as_deref(), &answers);
            if !errors.is_empty() {
                return Err(CoreError::invalid_content(errors));
            }
            TestQuestion {
                id: Uuid::new_v4().to_string(),
                test_id: test_id.to_string(),
                question_bank_item_id: None,
                source_type: SourceType::Manual,
                question_type,
                prompt: prompt.trim().to_string(),
                options,
                correct_answers: normalize_answers(&answers),
                explanation: clean(payload.explanation),
                difficulty: payload.difficulty.unwrap_or(Difficulty::Medium),
                skill: clean(payload.skill),
                points,
                position,
            }
        }
    };

    let stamp = ts(&now);
    let inserted = conn.execute(
        "INSERT INTO test_questions(
            id, test_id, workspace_id, question_bank_item_id, source_type, question_type, prompt,
            options_json, correct_answers_json, explanation, difficulty, skill, points, position,
            created_by_user_id, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            question.id,
            question.test_id,
            workspace_id,
            question.question_bank_item_id,
            question.source_type,
            question.question_type,
            question.prompt,
            question.options.as_deref().map(json_list),
            json_list(&question.correct_answers),
            question.explanation,
            question.difficulty,
            question.skill,
            question.points,
            question.position,
            user_id,
            stamp,
            stamp
        ],
    );
    match inserted {
        Ok(_) => Ok(question),
        Err(e) if is_unique_violation(&e) => Err(CoreError::conflict(format!(
            "Position {} is already used in this test",
            position
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Remaining positions are left as they are.
pub fn remove_question(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
    question_id: &str,
) -> CoreResult<()> {
    owner_of(conn, actor, workspace_id)?;
    let test = require_test(conn, workspace_id, test_id)?;
    if test.status == TestStatus::Published {
        return Err(CoreError::conflict("Cannot modify questions for a published test"));
    }
    let removed = conn.execute(
        "DELETE FROM test_questions WHERE id = ? AND test_id = ? AND workspace_id = ?",
        params![question_id, test_id, workspace_id],
    )?;
    if removed == 0 {
        return Err(CoreError::not_found("Question not found"));
    }
    Ok(())
}

fn question_from_row(r: &Row<'_>) -> rusqlite::Result<TestQuestion> {
    Ok(TestQuestion {
        id: r.get(0)?,
        test_id: r.get(1)?,
        question_bank_item_id: r.get(2)?,
        source_type: r.get(3)?,
        question_type: r.get(4)?,
        prompt: r.get(5)?,
        options: json_list_col(r, 6)?,
        correct_answers: json_list_col(r, 7)?.unwrap_or_default(),
        explanation: r.get(8)?,
        difficulty: r.get(9)?,
        skill: r.get(10)?,
        points: r.get(11)?,
        position: r.get(12)?,
    })
}

/// Questions of a test in position order, without an ownership check.
pub fn questions_for_test(conn: &Connection, workspace_id: &str, test_id: &str) -> CoreResult<Vec<TestQuestion>> {
    let mut stmt = conn.prepare(
        "SELECT id, test_id, question_bank_item_id, source_type, question_type, prompt,
                options_json, correct_answers_json, explanation, difficulty, skill, points, position
         FROM test_questions
         WHERE test_id = ? AND workspace_id = ?
         ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![test_id, workspace_id], question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_questions(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    test_id: &str,
) -> CoreResult<Vec<TestQuestion>> {
    owner_of(conn, actor, workspace_id)?;
    questions_for_test(conn, workspace_id, test_id)
}
