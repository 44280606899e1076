use crate::error::{CoreError, CoreResult};
use crate::model::LearnerRole;
use serde::Deserialize;

/// Caller identity resolved once per request and handed to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Teacher {
        user_id: String,
    },
    Learner {
        learner_id: String,
        role: LearnerRole,
    },
}

/// Raw `actor` object as it arrives on a request line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub learner_id: Option<String>,
    #[serde(default)]
    pub role: Option<LearnerRole>,
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Actor {
    /// `Ok(None)` for anonymous requests; an object that names no usable
    /// identity is rejected rather than treated as anonymous.
    pub fn resolve(raw: Option<&ActorParams>) -> CoreResult<Option<Actor>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        match (non_empty(raw.user_id.as_ref()), non_empty(raw.learner_id.as_ref())) {
            (Some(user_id), None) => Ok(Some(Actor::Teacher { user_id })),
            (None, Some(learner_id)) => {
                let role = raw.role.ok_or(CoreError::Unauthorized)?;
                Ok(Some(Actor::Learner { learner_id, role }))
            }
            _ => Err(CoreError::Unauthorized),
        }
    }
}

pub fn require_teacher(actor: Option<&Actor>) -> CoreResult<&str> {
    match actor {
        Some(Actor::Teacher { user_id }) => Ok(user_id.as_str()),
        Some(Actor::Learner { .. }) => Err(CoreError::forbidden(
            "Only teacher accounts can manage workspaces",
        )),
        None => Err(CoreError::Unauthorized),
    }
}

pub fn require_learner(actor: Option<&Actor>) -> CoreResult<(&str, LearnerRole)> {
    match actor {
        Some(Actor::Learner { learner_id, role }) => Ok((learner_id.as_str(), *role)),
        Some(Actor::Teacher { .. }) => Err(CoreError::forbidden(
            "Only learner accounts can take tests",
        )),
        None => Err(CoreError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_teacher_and_learner() {
        let t = ActorParams {
            user_id: Some("u1".into()),
            ..Default::default()
        };
        assert_eq!(
            Actor::resolve(Some(&t)).expect("teacher"),
            Some(Actor::Teacher { user_id: "u1".into() })
        );

        let l = ActorParams {
            learner_id: Some("l1".into()),
            role: Some(LearnerRole::Parent),
            ..Default::default()
        };
        assert_eq!(
            Actor::resolve(Some(&l)).expect("learner"),
            Some(Actor::Learner {
                learner_id: "l1".into(),
                role: LearnerRole::Parent
            })
        );
        assert_eq!(Actor::resolve(None).expect("anon"), None);
    }

    #[test]
    fn ambiguous_or_incomplete_identity_is_unauthorized() {
        let both = ActorParams {
            user_id: Some("u".into()),
            learner_id: Some("l".into()),
            role: Some(LearnerRole::Student),
        };
        assert!(matches!(Actor::resolve(Some(&both)), Err(CoreError::Unauthorized)));

        let no_role = ActorParams {
            learner_id: Some("l".into()),
            ..Default::default()
        };
        assert!(matches!(Actor::resolve(Some(&no_role)), Err(CoreError::Unauthorized)));

        assert!(matches!(require_teacher(None), Err(CoreError::Unauthorized)));
    }
}
