//! Workspaces, classrooms, memberships, learner links and invites: the
//! records that decide who can be assigned a test.

use crate::actor::{require_teacher, Actor};
use crate::db::{json_list, json_list_col, ts, ts_col, ts_col_required};
use crate::error::{is_unique_violation, CoreError, CoreResult};
use crate::model::{LearnerRole, MembershipStatus};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

pub const INVITE_TTL_DAYS_MIN: i64 = 1;
pub const INVITE_TTL_DAYS_MAX: i64 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub display_name: String,
    pub grade_levels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: String,
    pub name: String,
    pub grade: String,
    pub active_student_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub learner_id: String,
    pub display_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MembershipStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvite {
    /// Only ever returned here; the store keeps a digest.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub student_name: Option<String>,
    pub claim_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteInfo {
    pub workspace_id: String,
    pub student_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub invite: InviteInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    CreatedNew,
    LinkedExisting,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub status: ClaimKind,
    pub learner_id: String,
    pub workspace_id: String,
    pub role: LearnerRole,
}

fn trimmed(s: &str) -> String {
    s.trim().to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_invite_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn ensure_workspace_owner(conn: &Connection, workspace_id: &str, user_id: &str) -> CoreResult<()> {
    let owned = conn
        .query_row(
            "SELECT 1 FROM workspaces WHERE id = ? AND owner_user_id = ? LIMIT 1",
            params![workspace_id, user_id],
            |_r| Ok(()),
        )
        .optional()?;
    match owned {
        Some(()) => Ok(()),
        None => Err(CoreError::forbidden(
            "Workspace not found or not owned by teacher",
        )),
    }
}

/// Teacher gate used by every management operation.
pub fn owner_of(conn: &Connection, actor: Option<&Actor>, workspace_id: &str) -> CoreResult<String> {
    let user_id = require_teacher(actor)?;
    ensure_workspace_owner(conn, workspace_id, user_id)?;
    Ok(user_id.to_string())
}

fn load_workspace_for_owner(conn: &Connection, user_id: &str) -> CoreResult<Option<Workspace>> {
    let row = conn
        .query_row(
            "SELECT w.id, w.owner_user_id, w.name, p.display_name, p.grade_levels, w.created_at
             FROM workspaces w
             JOIN teacher_profiles p ON p.workspace_id = w.id
             WHERE w.owner_user_id = ?",
            [user_id],
            |r| {
                Ok(Workspace {
                    id: r.get(0)?,
                    owner_user_id: r.get(1)?,
                    name: r.get(2)?,
                    display_name: r.get(3)?,
                    grade_levels: json_list_col(r, 4)?.unwrap_or_default(),
                    created_at: ts_col_required(r, 5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Creates the teacher's profile and single workspace, or updates the
/// profile when both already exist.
pub fn onboard_teacher(
    conn: &Connection,
    actor: Option<&Actor>,
    display_name: &str,
    grade_levels: &[String],
    now: DateTime<Utc>,
) -> CoreResult<Workspace> {
    let user_id = require_teacher(actor)?;
    let display_name = trimmed(display_name);
    if display_name.chars().count() < 2 {
        return Err(CoreError::bad_request("displayName must be at least 2 characters"));
    }
    let grades: Vec<String> = grade_levels
        .iter()
        .map(|g| trimmed(g))
        .filter(|g| !g.is_empty())
        .collect();
    if grades.is_empty() {
        return Err(CoreError::bad_request("gradeLevels must contain at least one grade"));
    }

    let tx = conn.unchecked_transaction()?;
    let stamp = ts(&now);
    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM workspaces WHERE owner_user_id = ?",
            [user_id],
            |r| r.get(0),
        )
        .optional()?;
    let workspace_id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO workspaces(id, owner_user_id, name, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?)",
                params![id, user_id, format!("{}'s Workspace", display_name), stamp, stamp],
            )?;
            info!(workspace_id = %id, "workspace created");
            id
        }
    };
    tx.execute(
        "INSERT INTO teacher_profiles(
            user_id, workspace_id, display_name, grade_levels, onboarded_at, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
            display_name = excluded.display_name,
            grade_levels = excluded.grade_levels,
            updated_at = excluded.updated_at",
        params![user_id, workspace_id, display_name, json_list(&grades), stamp, stamp, stamp],
    )?;
    tx.commit()?;

    load_workspace_for_owner(conn, user_id)?
        .ok_or_else(|| CoreError::not_found("Workspace not found"))
}

pub fn teacher_workspace(conn: &Connection, actor: Option<&Actor>) -> CoreResult<Workspace> {
    let user_id = require_teacher(actor)?;
    load_workspace_for_owner(conn, user_id)?
        .ok_or_else(|| CoreError::not_found("Teacher has not completed onboarding"))
}

pub fn classroom_exists(conn: &Connection, workspace_id: &str, classroom_id: &str) -> CoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM classrooms WHERE id = ? AND workspace_id = ? LIMIT 1",
            params![classroom_id, workspace_id],
            |_r| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn list_classrooms(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
) -> CoreResult<Vec<Classroom>> {
    owner_of(conn, actor, workspace_id)?;
    // Correlated subquery keeps one row per classroom.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.grade,
           (SELECT COUNT(*) FROM classroom_students cs
             WHERE cs.classroom_id = c.id AND cs.workspace_id = c.workspace_id
               AND cs.status = 'active') AS active_count,
           c.created_at
         FROM classrooms c
         WHERE c.workspace_id = ?
         ORDER BY c.grade, c.name",
    )?;
    let rows = stmt
        .query_map([workspace_id], |r| {
            Ok(Classroom {
                id: r.get(0)?,
                name: r.get(1)?,
                grade: r.get(2)?,
                active_student_count: r.get(3)?,
                created_at: ts_col_required(r, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_classroom(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    name: &str,
    grade: &str,
    now: DateTime<Utc>,
) -> CoreResult<Classroom> {
    let user_id = owner_of(conn, actor, workspace_id)?;
    let name = trimmed(name);
    let grade = trimmed(grade);
    let mut problems = Vec::new();
    if name.chars().count() < 2 {
        problems.push("name must be at least 2 characters".to_string());
    }
    if grade.is_empty() {
        problems.push("grade must not be empty".to_string());
    }
    if !problems.is_empty() {
        return Err(CoreError::BadRequest {
            message: "Classroom details are invalid.".to_string(),
            problems,
        });
    }

    let id = Uuid::new_v4().to_string();
    let stamp = ts(&now);
    match conn.execute(
        "INSERT INTO classrooms(id, workspace_id, name, grade, created_by_user_id, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![id, workspace_id, name, grade, user_id, stamp, stamp],
    ) {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(CoreError::conflict(
                "Classroom with same name and grade already exists",
            ))
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Classroom {
        id,
        name,
        grade,
        active_student_count: 0,
        created_at: now,
    })
}

pub fn list_workspace_students(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
) -> CoreResult<Vec<RosterStudent>> {
    owner_of(conn, actor, workspace_id)?;
    let mut stmt = conn.prepare(
        "SELECT la.id, la.display_name, la.email
         FROM workspace_learners wl
         JOIN learner_accounts la ON la.id = wl.learner_id
         WHERE wl.workspace_id = ? AND wl.role = 'student'
         ORDER BY la.display_name",
    )?;
    let rows = stmt
        .query_map([workspace_id], |r| {
            Ok(RosterStudent {
                learner_id: r.get(0)?,
                display_name: r.get(1)?,
                email: r.get(2)?,
                status: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_classroom_students(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    classroom_id: &str,
) -> CoreResult<Vec<RosterStudent>> {
    owner_of(conn, actor, workspace_id)?;
    if !classroom_exists(conn, workspace_id, classroom_id)? {
        return Err(CoreError::not_found("Classroom not found"));
    }
    let mut stmt = conn.prepare(
        "SELECT la.id, la.display_name, la.email, cs.status
         FROM classroom_students cs
         JOIN learner_accounts la ON la.id = cs.learner_id
         WHERE cs.classroom_id = ? AND cs.workspace_id = ?
         ORDER BY la.display_name",
    )?;
    let rows = stmt
        .query_map(params![classroom_id, workspace_id], |r| {
            Ok(RosterStudent {
                learner_id: r.get(0)?,
                display_name: r.get(1)?,
                email: r.get(2)?,
                status: Some(r.get(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn learner_role(conn: &Connection, workspace_id: &str, learner_id: &str) -> CoreResult<Option<LearnerRole>> {
    let role = conn
        .query_row(
            "SELECT role FROM workspace_learners WHERE workspace_id = ? AND learner_id = ?",
            params![workspace_id, learner_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(role)
}

/// The learner must be linked to the workspace under exactly the claimed role.
pub fn ensure_learner_access(
    conn: &Connection,
    workspace_id: &str,
    learner_id: &str,
    role: LearnerRole,
) -> CoreResult<()> {
    match learner_role(conn, workspace_id, learner_id)? {
        Some(linked) if linked == role => Ok(()),
        _ => Err(CoreError::forbidden(
            "Learner does not have access to this workspace",
        )),
    }
}

/// Adding a student who was soft-removed flips the existing row back to
/// active instead of inserting a second one.
pub fn add_classroom_student(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    classroom_id: &str,
    learner_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<MembershipStatus> {
    owner_of(conn, actor, workspace_id)?;
    if !classroom_exists(conn, workspace_id, classroom_id)? {
        return Err(CoreError::not_found("Classroom not found"));
    }
    if learner_role(conn, workspace_id, learner_id)? != Some(LearnerRole::Student) {
        return Err(CoreError::bad_request(
            "Learner is not an active student in this workspace",
        ));
    }

    let stamp = ts(&now);
    conn.execute(
        "INSERT INTO classroom_students(id, classroom_id, workspace_id, learner_id, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, 'active', ?, ?)
         ON CONFLICT(classroom_id, learner_id) DO UPDATE SET
            status = 'active',
            updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            classroom_id,
            workspace_id,
            learner_id,
            stamp,
            stamp
        ],
    )?;
    Ok(MembershipStatus::Active)
}

pub fn remove_classroom_student(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    classroom_id: &str,
    learner_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<MembershipStatus> {
    owner_of(conn, actor, workspace_id)?;
    let changed = conn.execute(
        "UPDATE classroom_students SET status = 'inactive', updated_at = ?
         WHERE classroom_id = ? AND workspace_id = ? AND learner_id = ?",
        params![ts(&now), classroom_id, workspace_id, learner_id],
    )?;
    if changed == 0 {
        return Err(CoreError::not_found("Student is not a member of this classroom"));
    }
    Ok(MembershipStatus::Inactive)
}

/// Learners who would be assigned if the classroom's test were published now.
/// Parents never appear here even when they hold an active membership.
pub fn active_roster(conn: &Connection, workspace_id: &str, classroom_id: &str) -> CoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT cs.learner_id
         FROM classroom_students cs
         JOIN workspace_learners wl
           ON wl.workspace_id = cs.workspace_id AND wl.learner_id = cs.learner_id
         WHERE cs.classroom_id = ?
           AND cs.workspace_id = ?
           AND cs.status = 'active'
           AND wl.role = 'student'
         ORDER BY cs.created_at, cs.learner_id",
    )?;
    let ids = stmt
        .query_map(params![classroom_id, workspace_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn create_invite(
    conn: &Connection,
    actor: Option<&Actor>,
    workspace_id: &str,
    student_name: Option<&str>,
    expires_in_days: i64,
    now: DateTime<Utc>,
) -> CoreResult<CreatedInvite> {
    let user_id = owner_of(conn, actor, workspace_id)?;
    if !(INVITE_TTL_DAYS_MIN..=INVITE_TTL_DAYS_MAX).contains(&expires_in_days) {
        return Err(CoreError::bad_request(format!(
            "expiresInDays must be in {}..={}",
            INVITE_TTL_DAYS_MIN, INVITE_TTL_DAYS_MAX
        )));
    }
    let student_name = student_name.map(trimmed).filter(|s| !s.is_empty());
    let token = Uuid::new_v4().simple().to_string();
    let expires_at = now + Duration::days(expires_in_days);
    let stamp = ts(&now);

    conn.execute(
        "INSERT INTO invites(
            id, token_hash, workspace_id, created_by_user_id, student_name, expires_at, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            hash_invite_token(&token),
            workspace_id,
            user_id,
            student_name,
            ts(&expires_at),
            stamp,
            stamp
        ],
    )?;

    Ok(CreatedInvite {
        claim_path: format!("/invite/{}", token),
        token,
        expires_at,
        student_name,
    })
}

struct InviteRow {
    id: String,
    info: InviteInfo,
}

fn load_invite(conn: &Connection, token: &str) -> CoreResult<Option<InviteRow>> {
    let row = conn
        .query_row(
            "SELECT id, workspace_id, student_name, expires_at, claimed_at
             FROM invites WHERE token_hash = ?",
            [hash_invite_token(token.trim())],
            |r| {
                Ok(InviteRow {
                    id: r.get(0)?,
                    info: InviteInfo {
                        workspace_id: r.get(1)?,
                        student_name: r.get(2)?,
                        expires_at: ts_col_required(r, 3)?,
                        claimed_at: ts_col(r, 4)?,
                    },
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn inspect_invite(conn: &Connection, token: &str, now: DateTime<Utc>) -> CoreResult<InviteStatus> {
    let Some(row) = load_invite(conn, token)? else {
        return Err(CoreError::not_found("Invite not found"));
    };
    let reason = if row.info.expires_at < now {
        Some("Invite expired")
    } else if row.info.claimed_at.is_some() {
        Some("Invite already claimed")
    } else {
        None
    };
    Ok(InviteStatus {
        valid: reason.is_none(),
        reason: reason.map(str::to_string),
        invite: row.info,
    })
}

/// Single-use enrollment: finds or creates the learner by email, links them
/// to the invite's workspace under `role`, and burns the invite.
pub fn claim_invite(
    conn: &Connection,
    token: &str,
    email: &str,
    display_name: &str,
    role: LearnerRole,
    now: DateTime<Utc>,
) -> CoreResult<ClaimOutcome> {
    let normalized_email = normalize_email(email);
    let display_name = trimmed(display_name);
    let mut problems = Vec::new();
    if !normalized_email.contains('@') || normalized_email.len() < 3 {
        problems.push("email must be a valid address".to_string());
    }
    if display_name.chars().count() < 2 {
        problems.push("displayName must be at least 2 characters".to_string());
    }
    if !problems.is_empty() {
        return Err(CoreError::BadRequest {
            message: "Invite claim details are invalid.".to_string(),
            problems,
        });
    }

    let tx = conn.unchecked_transaction()?;
    let Some(invite) = load_invite(&tx, token)? else {
        return Err(CoreError::not_found("Invite not found"));
    };
    if invite.info.claimed_at.is_some() {
        return Err(CoreError::conflict("Invite already claimed"));
    }
    if invite.info.expires_at < now {
        return Err(CoreError::conflict("Invite expired"));
    }
    let workspace_id = invite.info.workspace_id;
    let stamp = ts(&now);

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM learner_accounts WHERE normalized_email = ?",
            [&normalized_email],
            |r| r.get(0),
        )
        .optional()?;
    let (learner_id, status) = match existing {
        Some(id) => (id, ClaimKind::LinkedExisting),
        None => {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO learner_accounts(id, email, normalized_email, display_name, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                params![id, email.trim(), normalized_email, display_name, stamp, stamp],
            )?;
            (id, ClaimKind::CreatedNew)
        }
    };

    match learner_role(&tx, &workspace_id, &learner_id)? {
        Some(linked) if linked != role => {
            return Err(CoreError::conflict(format!(
                "Learner is already linked to this workspace as {}",
                linked.as_str()
            )));
        }
        Some(_) => {}
        None => {
            tx.execute(
                "INSERT INTO workspace_learners(id, workspace_id, learner_id, role, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                params![Uuid::new_v4().to_string(), workspace_id, learner_id, role, stamp, stamp],
            )?;
        }
    }

    tx.execute(
        "UPDATE invites
         SET claimed_at = ?, claimed_by_learner_id = ?, claimed_by_role = ?, updated_at = ?
         WHERE id = ?",
        params![stamp, learner_id, role, stamp, invite.id],
    )?;
    tx.commit()?;

    info!(%workspace_id, %learner_id, role = role.as_str(), "invite claimed");
    Ok(ClaimOutcome {
        status,
        learner_id,
        workspace_id,
        role,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn onboarding_is_idempotent_per_teacher() {
        let s = seed();
        let again = onboard_teacher(&s.conn, Some(&s.teacher), "Ms R.", &["5".to_string(), "6".to_string()], t0())
            .expect("re-onboard");
        assert_eq!(again.id, s.workspace_id);
        assert_eq!(again.display_name, "Ms R.");
        assert_eq!(again.grade_levels, vec!["5", "6"]);
        assert_eq!(again.name, "Ms Rivera's Workspace");
    }

    #[test]
    fn foreign_teacher_is_forbidden() {
        let s = seed();
        let other = teacher("teacher-2");
        let e = list_classrooms(&s.conn, Some(&other), &s.workspace_id).unwrap_err();
        assert!(matches!(e, CoreError::Forbidden(_)));
        let e = list_classrooms(&s.conn, None, &s.workspace_id).unwrap_err();
        assert!(matches!(e, CoreError::Unauthorized));
    }

    #[test]
    fn duplicate_classroom_name_and_grade_conflicts() {
        let s = seed();
        let e = create_classroom(&s.conn, Some(&s.teacher), &s.workspace_id, " Room 5A ", "5", t0())
            .unwrap_err();
        assert!(matches!(e, CoreError::Conflict(_)));
        create_classroom(&s.conn, Some(&s.teacher), &s.workspace_id, "Room 5A", "6", t0())
            .expect("same name, other grade");
    }

    #[test]
    fn readding_a_removed_student_reactivates_the_same_row() {
        let s = seed();
        let learner = s.enroll("Alex Kim", LearnerRole::Student);
        remove_classroom_student(&s.conn, Some(&s.teacher), &s.workspace_id, &s.classroom_id, &learner, t0())
            .expect("remove");
        assert!(active_roster(&s.conn, &s.workspace_id, &s.classroom_id)
            .expect("roster")
            .is_empty());

        add_classroom_student(&s.conn, Some(&s.teacher), &s.workspace_id, &s.classroom_id, &learner, t0())
            .expect("re-add");
        let rows: i64 = s
            .conn
            .query_row(
                "SELECT COUNT(*) FROM classroom_students WHERE classroom_id = ?",
                [&s.classroom_id],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(rows, 1);
        assert_eq!(
            active_roster(&s.conn, &s.workspace_id, &s.classroom_id).expect("roster"),
            vec![learner]
        );
    }

    #[test]
    fn parents_cannot_join_a_classroom_roster() {
        let s = seed();
        let parent = s.enroll("Pat Parent", LearnerRole::Parent);
        let e = add_classroom_student(&s.conn, Some(&s.teacher), &s.workspace_id, &s.classroom_id, &parent, t0())
            .unwrap_err();
        assert!(matches!(e, CoreError::BadRequest { .. }));
    }

    #[test]
    fn invite_is_single_use_and_expires() {
        let s = seed();
        let invite = create_invite(&s.conn, Some(&s.teacher), &s.workspace_id, Some(" Sam "), 2, t0())
            .expect("invite");
        assert_eq!(invite.student_name.as_deref(), Some("Sam"));
        assert!(inspect_invite(&s.conn, &invite.token, t0()).expect("inspect").valid);

        let late = t0() + Duration::days(3);
        let status = inspect_invite(&s.conn, &invite.token, late).expect("inspect late");
        assert!(!status.valid);
        assert_eq!(status.reason.as_deref(), Some("Invite expired"));
        let e = claim_invite(&s.conn, &invite.token, "sam@example.test", "Sam Lee", LearnerRole::Student, late)
            .unwrap_err();
        assert!(matches!(e, CoreError::Conflict(_)));

        let ok = claim_invite(&s.conn, &invite.token, "Sam@Example.test ", "Sam Lee", LearnerRole::Student, t0())
            .expect("claim");
        assert_eq!(ok.status, ClaimKind::CreatedNew);
        let e = claim_invite(&s.conn, &invite.token, "sam@example.test", "Sam Lee", LearnerRole::Student, t0())
            .unwrap_err();
        assert!(matches!(e, CoreError::Conflict(_)));
    }

    #[test]
    fn second_invite_links_existing_learner_but_role_is_fixed() {
        let s = seed();
        let first = s.enroll("Jo Park", LearnerRole::Student);

        let again = create_invite(&s.conn, Some(&s.teacher), &s.workspace_id, None, 7, t0()).expect("invite");
        let e = claim_invite(&s.conn, &again.token, "jo.park@example.test", "Jo Park", LearnerRole::Parent, t0())
            .unwrap_err();
        assert!(matches!(e, CoreError::Conflict(_)));

        let ok = claim_invite(&s.conn, &again.token, "JO.PARK@example.test", "Jo Park", LearnerRole::Student, t0())
            .expect("claim");
        assert_eq!(ok.status, ClaimKind::LinkedExisting);
        assert_eq!(ok.learner_id, first);
    }

    #[test]
    fn unknown_invite_token_is_not_found() {
        let s = seed();
        let e = inspect_invite(&s.conn, "nope", t0()).unwrap_err();
        assert!(matches!(e, CoreError::NotFound(_)));
    }
}
