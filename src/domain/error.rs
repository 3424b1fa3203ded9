//! Domain error types.

/// Top-level error type for blocktrader.
#[derive(Debug, thiserror::Error)]
pub enum BlocktraderError {
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

    #[error("condition {node_id}: unknown indicator {indicator}")]
    UnknownIndicator { node_id: String, indicator: String },

    #[error("condition {node_id}: cannot compute {indicator}: {reason}")]
    InvalidIndicator {
        node_id: String,
        indicator: String,
        reason: String,
    },

    #[error("condition {node_id}: {reason}")]
    InvalidCondition { node_id: String, reason: String },

    #[error("duplicate node id {node_id}")]
    DuplicateNodeId { node_id: String },

    #[error("condition {node_id}: event '{event}' is not in the event calendar")]
    UnknownEvent { node_id: String, event: String },

    #[error("condition {node_id}: {indicator} needs an auxiliary series but none was supplied")]
    MissingAuxSeries { node_id: String, indicator: String },

    #[error("strategy {strategy}: {direction} entries are not supported")]
    UnsupportedDirection { strategy: String, direction: String },

    #[error("insufficient data: have {bars} bars, {indicator} needs {minimum}")]
    InsufficientData {
        bars: usize,
        minimum: usize,
        indicator: String,
    },

    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BlocktraderError {
    /// Errors raised while resolving a strategy against the indicator engine.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BlocktraderError::UnknownIndicator { .. }
                | BlocktraderError::InvalidIndicator { .. }
                | BlocktraderError::InvalidCondition { .. }
                | BlocktraderError::DuplicateNodeId { .. }
                | BlocktraderError::UnknownEvent { .. }
                | BlocktraderError::MissingAuxSeries { .. }
                | BlocktraderError::UnsupportedDirection { .. }
        )
    }
}

impl From<&BlocktraderError> for std::process::ExitCode {
    fn from(err: &BlocktraderError) -> Self {
        let code: u8 = match err {
            BlocktraderError::Io(_) => 1,
            BlocktraderError::ConfigParse { .. }
            | BlocktraderError::ConfigMissing { .. }
            | BlocktraderError::ConfigInvalid { .. }
            | BlocktraderError::Json(_) => 2,
            BlocktraderError::UnknownIndicator { .. }
            | BlocktraderError::InvalidIndicator { .. }
            | BlocktraderError::InvalidCondition { .. }
            | BlocktraderError::DuplicateNodeId { .. }
            | BlocktraderError::UnknownEvent { .. }
            | BlocktraderError::MissingAuxSeries { .. }
            | BlocktraderError::UnsupportedDirection { .. } => 4,
            BlocktraderError::InsufficientData { .. } | BlocktraderError::InvalidData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
