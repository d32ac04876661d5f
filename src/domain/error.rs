//! Domain error types.

/// Top-level error type for closecache.
#[derive(Debug, thiserror::Error)]
pub enum CloseCacheError {
    #[error("no price history found for {symbol}; check that it is a valid symbol")]
    UnknownSymbol { symbol: String },

    #[error("data provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },

    #[error("malformed provider payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("store query error: {reason}")]
    StoreQuery { reason: String },

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

    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CloseCacheError {
    /// Whether the failure came from the persistence layer.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            CloseCacheError::Store { .. } | CloseCacheError::StoreQuery { .. }
        )
    }
}

impl From<&CloseCacheError> for std::process::ExitCode {
    fn from(err: &CloseCacheError) -> Self {
        let code: u8 = match err {
            CloseCacheError::Io(_) => 1,
            CloseCacheError::ConfigParse { .. }
            | CloseCacheError::ConfigMissing { .. }
            | CloseCacheError::ConfigInvalid { .. } => 2,
            CloseCacheError::Store { .. } | CloseCacheError::StoreQuery { .. } => 3,
            CloseCacheError::UnknownSymbol { .. } => 4,
            CloseCacheError::ProviderUnavailable { .. }
            | CloseCacheError::MalformedPayload { .. } => 5,
            CloseCacheError::InvalidDate { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
