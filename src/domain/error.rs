//! Domain error types.

/// Whether an error was caused by the caller's input or by the system itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad series, bad parameters, bad config. The caller can fix these.
    Input,
    /// I/O, serialization or collaborator failures.
    Internal,
}

/// Top-level error type for unum.
#[derive(Debug, thiserror::Error)]
pub enum UnumError {
    #[error("missing input field: {field}")]
    MissingField { field: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("invalid series: {reason}")]
    InvalidSeries { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol} {timeframe}")]
    NoData { symbol: String, timeframe: String },

    #[error("data load error: {reason}")]
    DataLoad { reason: String },

    #[error("advisory error: {reason}")]
    Advisory { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UnumError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        UnumError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UnumError::MissingField { .. }
            | UnumError::InvalidParameter { .. }
            | UnumError::InvalidSeries { .. }
            | UnumError::ConfigParse { .. }
            | UnumError::ConfigMissing { .. }
            | UnumError::ConfigInvalid { .. }
            | UnumError::NoData { .. } => ErrorKind::Input,
            UnumError::DataLoad { .. }
            | UnumError::Advisory { .. }
            | UnumError::Json(_)
            | UnumError::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<&UnumError> for std::process::ExitCode {
    fn from(err: &UnumError) -> Self {
        let code: u8 = match err {
            UnumError::Io(_) | UnumError::Json(_) => 1,
            UnumError::ConfigParse { .. }
            | UnumError::ConfigMissing { .. }
            | UnumError::ConfigInvalid { .. } => 2,
            UnumError::DataLoad { .. } | UnumError::Advisory { .. } => 3,
            UnumError::InvalidParameter { .. } => 4,
            UnumError::MissingField { .. }
            | UnumError::InvalidSeries { .. }
            | UnumError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
