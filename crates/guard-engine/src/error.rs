//! Engine construction errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid time '{value}': expected HH:MM or HH:MM:SS")]
    InvalidTime { value: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
