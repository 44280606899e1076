use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;

pub const DB_FILE: &str = "quizdesk.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace directory {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspaces(
            id TEXT PRIMARY KEY,
            owner_user_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_profiles(
            user_id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            grade_levels TEXT NOT NULL,
            onboarded_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(workspace_id) REFERENCES workspaces(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learner_accounts(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            normalized_email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspace_learners(
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(workspace_id) REFERENCES workspaces(id),
            FOREIGN KEY(learner_id) REFERENCES learner_accounts(id),
            UNIQUE(workspace_id, learner_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS invites(
            id TEXT PRIMARY KEY,
            token_hash TEXT NOT NULL UNIQUE,
            workspace_id TEXT NOT NULL,
            created_by_user_id TEXT NOT NULL,
            student_name TEXT,
            expires_at TEXT NOT NULL,
            claimed_at TEXT,
            claimed_by_learner_id TEXT,
            claimed_by_role TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(workspace_id) REFERENCES workspaces(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invites_workspace ON invites(workspace_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classrooms(
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            name TEXT NOT NULL,
            grade TEXT NOT NULL,
            created_by_user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(workspace_id) REFERENCES workspaces(id),
            UNIQUE(workspace_id, name, grade)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classroom_students(
            id TEXT PRIMARY KEY,
            classroom_id TEXT NOT NULL,
            workspace_id TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id),
            FOREIGN KEY(learner_id) REFERENCES learner_accounts(id),
            UNIQUE(classroom_id, learner_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classroom_students_workspace ON classroom_students(workspace_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS question_bank_items(
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            created_by_user_id TEXT NOT NULL,
            grade TEXT NOT NULL,
            subject TEXT NOT NULL,
            topic TEXT NOT NULL,
            skill TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            question_type TEXT NOT NULL,
            prompt TEXT NOT NULL,
            options_json TEXT,
            correct_answers_json TEXT NOT NULL,
            explanation TEXT,
            tags_json TEXT NOT NULL,
            estimated_time_seconds INTEGER NOT NULL DEFAULT 60,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(workspace_id) REFERENCES workspaces(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bank_items_workspace ON question_bank_items(workspace_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            classroom_id TEXT,
            title TEXT NOT NULL,
            description TEXT,
            grade TEXT,
            subject TEXT,
            topic TEXT,
            objective TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            question_count_target INTEGER NOT NULL DEFAULT 10,
            time_limit_mins INTEGER,
            attempt_limit INTEGER NOT NULL DEFAULT 1,
            feedback_mode TEXT NOT NULL DEFAULT 'after_submission',
            shuffle_questions INTEGER NOT NULL DEFAULT 1,
            shuffle_options INTEGER NOT NULL DEFAULT 1,
            max_score INTEGER NOT NULL DEFAULT 100,
            starts_at TEXT,
            ends_at TEXT,
            published_at TEXT,
            created_by_user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(workspace_id) REFERENCES workspaces(id),
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_workspace ON tests(workspace_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS test_questions(
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL,
            workspace_id TEXT NOT NULL,
            question_bank_item_id TEXT,
            source_type TEXT NOT NULL DEFAULT 'manual',
            question_type TEXT NOT NULL,
            prompt TEXT NOT NULL,
            options_json TEXT,
            correct_answers_json TEXT NOT NULL,
            explanation TEXT,
            difficulty TEXT NOT NULL DEFAULT 'medium',
            skill TEXT,
            points INTEGER NOT NULL DEFAULT 1,
            position INTEGER NOT NULL,
            created_by_user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(test_id) REFERENCES tests(id),
            UNIQUE(test_id, position)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS test_assignments(
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL,
            workspace_id TEXT NOT NULL,
            classroom_id TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'assigned',
            assigned_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(test_id) REFERENCES tests(id),
            FOREIGN KEY(learner_id) REFERENCES learner_accounts(id),
            UNIQUE(test_id, learner_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_test_assignments_learner ON test_assignments(workspace_id, learner_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS test_attempts(
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL,
            workspace_id TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'started',
            started_at TEXT NOT NULL,
            submitted_at TEXT,
            score TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(test_id) REFERENCES tests(id),
            FOREIGN KEY(learner_id) REFERENCES learner_accounts(id),
            UNIQUE(test_id, learner_id, workspace_id)
        )",
        [],
    )?;

    Ok(())
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn ts_col_required(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    ts_col(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "timestamp".to_string(),
        Type::Null,
    ))
}

pub fn json_list_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<String>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str::<Vec<String>>(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}
