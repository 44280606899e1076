//! Workspace-scoped reusable questions.

use crate::actor::Actor;
use crate::content::{normalize_answers, normalize_options, validate_question_content};
use crate::db::{json_list, json_list_col, ts, ts_col_required};
use crate::error::{CoreError, CoreResult};
use crate::model::{BankItemStatus, Difficulty, QuestionType};
use crate::roster::owner_of;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rows fetched before filters are applied.
pub const LIST_LIMIT: usize = 200;
pub const DEFAULT_ESTIMATED_TIME_SECONDS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBankItem {
    pub grade: String,
    pub subject: String,
    pub topic: String,
    pub skill: String,
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub estimated_time_seconds: Option<i64>,
    #[serde(default)]
    pub status: Option<BankItemStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankItem {
    pub id: String,
    pub workspace_id: String,
    pub grade: String,
    pub subject: String,
    pub topic: String,
    pub skill: String,
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub correct_answers: Vec<String>,
    pub explanation: Option<String>,
    pub tags: Vec<String>,
    pub estimated_time_seconds: i64,
    pub status: BankItemStatus,
    pub created_at: DateTime<Utc>,
}

/// Equality filters; `None` matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankFilters {
    pub grade: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub skill: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub difficulty: Option<Difficulty>,
    pub status: Option<BankItemStatus>,
}

impl BankFilters {
    fn matches(&self, item: &BankItem) -> bool {
        fn eq_text(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }
        eq_text(&self.grade, &item.grade)
            && eq_text(&self.subject, &item.subject)
            && eq_text(&self.topic, &item.topic)
            && eq_text(&self.skill, &item.skill)
            && self.question_type.map_or(true, |t| t == item.question_type)
            && self.difficulty.map_or(true, |d| d == item.difficulty)
            && self.status.map_or(true, |s| s == item.status)
    }
}

const BANK_COLUMNS: &str = "id, workspace_id, grade, subject, topic, skill, difficulty, question_type,
    prompt, options_json, correct_answers_json, explanation, tags_json, estimated_time_seconds,
    status, created_at";

fn bank_item_from_row(r: &Row<'_>) -> rusqlite::Result<BankItem> {
    Ok(BankItem {
        id: r.get(0)?,
        workspace_id: r.get(1)?,
        grade: r.get(2)?,
        subject: r.get(3)?,
        topic: r.get(4)?,
        skill: r.get(5)?,
        difficulty: r.get(6)?,
        question_type: r.get(7)?,
        prompt: r.get(8)?,
        options: json_list_col(r, 9)?,
        correct_answers: json_list_col(r, 10)?.unwrap_or_default(),
        explanation: r.get(11)?,
        tags: json_list_col(r, 12)?.unwrap_or_default(),
        estimated_time_seconds: r.get(13)?,
        status: r.get(14)?,
        created_at: ts_col_required(r, 15)?,
    })
}

pub fn load_bank_item(conn: &Connection, workspace_id: &str, item_id: &str) -> CoreResult<Option<BankItem>> {
    let sql = format!(
        "SELECT {} FROM question_bank_items WHERE id = ? AND workspace_id = ?",
        BANK_COLUMNS
    );
    let item = conn
        .query_row(&sql, params![item_id, workspace_id], bank_item_from_row)
        .optional()?;
    Ok(item)
}

fn required_field(problems: &mut Vec<String>, name: &str, value: &str) -> String {
    let v = value.trim().to_string();
    if v.is_empty() {
        problems.push(format!("{} must not be empty", name));
    }
    v
}

pub fn create_bank_item(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    item: NewBankItem,
    now: DateTime<Utc>,
) -> CoreResult<BankItem> {
    let user_id = owner_of(conn, actor, workspace_id)?;

    let mut problems = Vec::new();
    let grade = required_field(&mut problems, "grade", &item.grade);
    let subject = required_field(&mut problems, "subject", &item.subject);
    let topic = required_field(&mut problems, "topic", &item.topic);
    let skill = required_field(&mut problems, "skill", &item.skill);
    let estimated = item
        .estimated_time_seconds
        .unwrap_or(DEFAULT_ESTIMATED_TIME_SECONDS);
    if !(10..=1800).contains(&estimated) {
        problems.push("estimatedTimeSeconds must be between 10 and 1800".to_string());
    }

    let options = normalize_options(item.options.as_deref());
    problems.extend(validate_question_content(
        item.question_type,
        &item.prompt,
        options.as_deref(),
        &item.correct_answers,
    ));
    if !problems.is_empty() {
        return Err(CoreError::BadRequest {
            message: "Bank item details are invalid.".to_string(),
            problems,
        });
    }

    let tags: Vec<String> = normalize_answers(&item.tags);
    let explanation = item
        .explanation
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    let answers = normalize_answers(&item.correct_answers);
    let status = item.status.unwrap_or(BankItemStatus::Draft);
    let id = Uuid::new_v4().to_string();
    let stamp = ts(&now);

    conn.execute(
        "INSERT INTO question_bank_items(
            id, workspace_id, created_by_user_id, grade, subject, topic, skill, difficulty,
            question_type, prompt, options_json, correct_answers_json, explanation, tags_json,
            estimated_time_seconds, status, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            workspace_id,
            user_id,
            grade,
            subject,
            topic,
            skill,
            item.difficulty,
            item.question_type,
            item.prompt.trim(),
            options.as_deref().map(json_list),
            json_list(&answers),
            explanation,
            json_list(&tags),
            estimated,
            status,
            stamp,
            stamp
        ],
    )?;

    Ok(BankItem {
        id,
        workspace_id: workspace_id.to_string(),
        grade,
        subject,
        topic,
        skill,
        difficulty: item.difficulty,
        question_type: item.question_type,
        prompt: item.prompt.trim().to_string(),
        options,
        correct_answers: answers,
        explanation,
        tags,
        estimated_time_seconds: estimated,
        status,
        created_at: now,
    })
}

/// Filters run after the capped fetch, so matching items older than the
/// newest `LIST_LIMIT` rows are never returned.
pub fn list_bank_items(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    filters: &BankFilters,
) -> CoreResult<Vec<BankItem>> {
    owner_of(conn, actor, workspace_id)?;
    let sql = format!(
        "SELECT {} FROM question_bank_items
         WHERE workspace_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?",
        BANK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![workspace_id, LIST_LIMIT as i64], bank_item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().filter(|item| filters.matches(item)).collect())
}
