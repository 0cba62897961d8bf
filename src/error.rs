use crate::resource::ErrorInfo;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Resource(ErrorInfo),
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("widget `{0}` is detached")]
    Detached(String),
    #[error("dialog {0} was dropped before it resolved")]
    DialogDropped(u64),
}

impl From<std::io::Error> for AppError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            context: "I/O operation failed".to_string(),
        }
    }
}

impl From<ErrorInfo> for AppError {
    fn from(info: ErrorInfo) -> Self {
        Self::Resource(info)
    }
}

impl AppError {
    pub fn io_with_context(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn detached(widget: impl Into<String>) -> Self {
        Self::Detached(widget.into())
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use crate::resource::ErrorInfo;

    #[test]
    fn resource_error_displays_status_and_message() {
        let err = AppError::from(ErrorInfo::new(Some(404), "directory not found"));
        assert!(matches!(err, AppError::Resource(_)));
        assert_eq!(err.to_string(), "request failed: 404: directory not found");
    }

    #[test]
    fn io_error_keeps_context() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = AppError::io_with_context(source, "failed to read script");
        assert_eq!(err.to_string(), "I/O error: failed to read script");
    }
}
