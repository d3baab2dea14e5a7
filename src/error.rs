use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("workspace not initialized at {0} (run `nlplanner init` first)")]
    NotInitialized(String),

    #[error("path escapes the workspace root: {0}")]
    PathEscape(String),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("project {0} not found")]
    ProjectNotFound(String),

    #[error("invalid value: {0}")]
    Validation(String),

    #[error("no free port in {start}..={end}")]
    PortUnavailable { start: u16, end: u16 },

    #[error("attachment {0} not found")]
    AttachmentNotFound(String),

    #[error("locked by another process: {0}")]
    Locked(String),

    #[error("corrupt document '{0}': {1}")]
    CorruptDocument(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PlannerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized(_) => "not_initialized",
            Self::PathEscape(_) => "path_escape",
            Self::TaskNotFound(_) => "task_not_found",
            Self::ProjectNotFound(_) => "project_not_found",
            Self::Validation(_) => "validation_error",
            Self::PortUnavailable { .. } => "port_unavailable",
            Self::AttachmentNotFound(_) => "attachment_not_found",
            Self::Locked(_) => "locked",
            Self::CorruptDocument(_, _) => "corrupt_document",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Yaml(_) => "yaml_error",
        }
    }

    /// HTTP status used when this error surfaces through the local API.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::TaskNotFound(_)
            | Self::ProjectNotFound(_)
            | Self::AttachmentNotFound(_)
            | Self::PathEscape(_) => 404,
            Self::Validation(_) => 400,
            Self::NotInitialized(_) => 503,
            Self::Locked(_) => 409,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_map_to_404() {
        assert_eq!(PlannerError::TaskNotFound("task-001".into()).http_status(), 404);
        assert_eq!(
            PlannerError::AttachmentNotFound("x.png".into()).http_status(),
            404
        );
        assert_eq!(PlannerError::PathEscape("../etc".into()).http_status(), 404);
    }

    #[test]
    fn validation_maps_to_400_with_stable_code() {
        let err = PlannerError::Validation("priority 'urgent'".into());
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn storage_failures_map_to_500() {
        let corrupt =
            PlannerError::CorruptDocument("projects/inbox/tasks/task-001.md".into(), "bad".into());
        assert_eq!(corrupt.code(), "corrupt_document");
        assert_eq!(corrupt.http_status(), 500);
        let io = PlannerError::from(std::io::Error::other("disk"));
        assert_eq!(io.code(), "io_error");
        assert_eq!(io.http_status(), 500);
    }
}
