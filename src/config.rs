//! Daemon configuration read from the environment (after `.env`, if any).

use crate::roster::{INVITE_TTL_DAYS_MAX, INVITE_TTL_DAYS_MIN};
use anyhow::{bail, Context};
use std::path::PathBuf;

pub const DEFAULT_INVITE_TTL_DAYS: i64 = 7;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Opened at startup so callers can skip `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub invite_ttl_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            invite_ttl_days: DEFAULT_INVITE_TTL_DAYS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let workspace = get("QUIZDESK_WORKSPACE").map(PathBuf::from);
        let log_filter = get("QUIZDESK_LOG")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let invite_ttl_days = match get("QUIZDESK_INVITE_TTL_DAYS") {
            None => DEFAULT_INVITE_TTL_DAYS,
            Some(raw) => {
                let days: i64 = raw
                    .parse()
                    .with_context(|| format!("QUIZDESK_INVITE_TTL_DAYS is not an integer: {}", raw))?;
                if !(INVITE_TTL_DAYS_MIN..=INVITE_TTL_DAYS_MAX).contains(&days) {
                    bail!(
                        "QUIZDESK_INVITE_TTL_DAYS must be between {} and {}, got {}",
                        INVITE_TTL_DAYS_MIN,
                        INVITE_TTL_DAYS_MAX,
                        days
                    );
                }
                days
            }
        };

        Ok(Self {
            workspace,
            log_filter,
            invite_ttl_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn log_filter_prefers_own_variable() {
        let cfg = Config::from_lookup(lookup(&[("RUST_LOG", "debug")])).expect("config");
        assert_eq!(cfg.log_filter, "debug");
        let cfg = Config::from_lookup(lookup(&[("RUST_LOG", "debug"), ("QUIZDESK_LOG", "warn")]))
            .expect("config");
        assert_eq!(cfg.log_filter, "warn");
    }

    #[test]
    fn workspace_and_ttl_are_read() {
        let cfg = Config::from_lookup(lookup(&[
            ("QUIZDESK_WORKSPACE", "/tmp/qd"),
            ("QUIZDESK_INVITE_TTL_DAYS", "14"),
        ]))
        .expect("config");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/qd")));
        assert_eq!(cfg.invite_ttl_days, 14);
    }

    #[test]
    fn out_of_range_ttl_fails() {
        assert!(Config::from_lookup(lookup(&[("QUIZDESK_INVITE_TTL_DAYS", "31")])).is_err());
        assert!(Config::from_lookup(lookup(&[("QUIZDESK_INVITE_TTL_DAYS", "week")])).is_err());
    }
}
