//! Enumerations stored as text columns.
//!
//! Each enum round-trips through its snake_case name: `as_str`/`parse` for
//! hand-written SQL and params, `ToSql`/`FromSql` for rusqlite binding, and
//! serde for the wire.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                Self::parse(s).ok_or_else(|| {
                    FromSqlError::Other(
                        format!("unknown {} value: {}", stringify!($name), s).into(),
                    )
                })
            }
        }
    };
}

text_enum!(QuestionType {
    Mcq => "mcq",
    MultiSelect => "multi_select",
    ShortText => "short_text",
    TrueFalse => "true_false",
});

impl QuestionType {
    /// Choice types carry an option list the correct answers must come from.
    pub fn is_choice(self) -> bool {
        !matches!(self, Self::ShortText)
    }
}

text_enum!(Difficulty {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

text_enum!(BankItemStatus {
    Draft => "draft",
    Reviewed => "reviewed",
    Approved => "approved",
});

text_enum!(
    /// Fixed per (workspace, learner) link; only students are ever assigned.
    LearnerRole {
        Student => "student",
        Parent => "parent",
    }
);

text_enum!(MembershipStatus {
    Active => "active",
    Inactive => "inactive",
});

text_enum!(
    /// `draft -> published`; there is no way back.
    TestStatus {
        Draft => "draft",
        Published => "published",
    }
);

text_enum!(AssignmentStatus {
    Assigned => "assigned",
    Started => "started",
    Submitted => "submitted",
});

text_enum!(AttemptStatus {
    Started => "started",
    Submitted => "submitted",
});

text_enum!(FeedbackMode {
    Immediate => "immediate",
    AfterSubmission => "after_submission",
    AfterDueDate => "after_due_date",
});

text_enum!(SourceType {
    Manual => "manual",
    Bank => "bank",
});
