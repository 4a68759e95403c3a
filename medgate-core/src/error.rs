use thiserror::Error;

#[derive(Error, Debug)]
pub enum MedgateError {
    #[error("access denied")]
    AccessDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("session already summarized")]
    AlreadySummarized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MedgateError {
    /// Short machine-readable kind, used by the IPC and HTTP layers to map
    /// errors onto response codes.
    pub fn kind(&self) -> &'static str {
        match self {
            MedgateError::AccessDenied => "access_denied",
            MedgateError::NotFound(_) => "not_found",
            MedgateError::InvalidState(_) => "invalid_state",
            MedgateError::Upstream(_) => "upstream_error",
            MedgateError::AlreadySummarized => "already_summarized",
            MedgateError::Database(_) => "database_error",
            MedgateError::Config(_) => "config_error",
            MedgateError::Io(_) => "io_error",
        }
    }
}
