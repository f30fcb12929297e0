use crate::codec::CodecError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("session not found")]
    NotFound,

    #[error("invalid tag {0:?}")]
    InvalidTag(String),

    #[error(transparent)]
    Format(#[from] CodecError),

    #[error("unsupported content type {0:?}; expected text/csv, application/json or text/html")]
    UnsupportedContentType(String),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
