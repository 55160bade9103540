use chrono::{DateTime, Utc};

/// Identifier the chat transport assigns to an end user.
pub type OperatorId = i64;

/// Identity row of a registered operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRecord {
    pub operator_id: OperatorId,
    pub role: OperatorRole,
    /// Free-form note set by whoever provisioned the operator.
    pub comment: String,
    pub created_by: OperatorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocked: bool,
}

impl OperatorRecord {
    /// A fresh, unblocked record stamped with `now` on both audit fields.
    pub fn new(
        operator_id: OperatorId,
        role: OperatorRole,
        comment: impl Into<String>,
        created_by: OperatorId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            operator_id,
            role,
            comment: comment.into(),
            created_by,
            created_at: now,
            updated_at: now,
            blocked: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorRole {
    Standard,
    Admin,
}

impl OperatorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorRole::Standard => "standard",
            OperatorRole::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "standard" => Some(OperatorRole::Standard),
            "admin" => Some(OperatorRole::Admin),
            _ => None,
        }
    }
}
