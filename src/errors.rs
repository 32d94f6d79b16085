use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("TRANSPORT_FAILURE: {0}")]
    Transport(String),
    #[error("HOST_REJECTED ({status}): {body}")]
    Host { status: u16, body: String },
    #[error("DECODE_FAILURE: {0}")]
    Decode(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
