use thiserror::Error;

/// Errors surfaced by the tab engine. Stale section references are not errors: the
/// render-time repair pass heals them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("option store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("course {0} not found")]
    CourseNotFound(i64),

    #[error("section {number} not found in course {course_id}")]
    SectionNotFound { course_id: i64, number: u32 },
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Stable IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MalformedInput(_) => "bad_params",
            Self::CourseNotFound(_) | Self::SectionNotFound { .. } => "not_found",
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
