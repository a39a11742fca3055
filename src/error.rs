use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i32),

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Already checked in today")]
    DuplicateCheckin,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream client error ({status}): {body}")]
    UpstreamClient { status: u16, body: String },

    #[error("Upstream server error: {0}")]
    UpstreamServer(String),

    #[error("Upstream request timed out")]
    UpstreamTimeout,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Stable machine-readable reason code, so callers can branch on cause
    /// without parsing display strings.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ApiError::InvalidAmount(_) => "INVALID_AMOUNT",
            ApiError::InsufficientCredits(_) => "INSUFFICIENT_CREDITS",
            ApiError::DuplicateCheckin => "DUPLICATE_CHECKIN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UpstreamClient { .. } => "UPSTREAM_CLIENT_ERROR",
            ApiError::UpstreamServer(_) => "UPSTREAM_SERVER_ERROR",
            ApiError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Detect write-time uniqueness violations (PostgreSQL error code 23505),
/// classified structurally by the driver rather than by message text.
pub fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    // The positive case needs a real driver error and is covered by the
    // database-gated duplicate-account and concurrent check-in tests.
    #[test]
    fn non_constraint_errors_are_not_unique_violations() {
        let err = sea_orm::DbErr::Custom("connection refused".to_string());
        assert!(!is_unique_violation(&err));

        let err = sea_orm::DbErr::RecordNotFound("accounts".to_string());
        assert!(!is_unique_violation(&err));
    }
}
