#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
    #[error("no member `{member}` on {owner}")]
    MissingMember { owner: String, member: String },
    #[error("type not found: {0}")]
    TypeNotFound(String),
    #[error("invoking `{member}` on {owner} failed: {reason}")]
    InvocationFailed {
        owner: String,
        member: String,
        reason: String,
    },
}

impl AccessError {
    pub fn missing(owner: impl Into<String>, member: impl Into<String>) -> Self {
        AccessError::MissingMember {
            owner: owner.into(),
            member: member.into(),
        }
    }

    pub fn failed(
        owner: impl Into<String>,
        member: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AccessError::InvocationFailed {
            owner: owner.into(),
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// True for the "member simply isn't there" family, which callers treat as
    /// "try the next strategy" rather than as a failure.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            AccessError::MissingMember { .. } | AccessError::TypeNotFound(_)
        )
    }
}

pub type AccessResult<T> = std::result::Result<T, AccessError>;
