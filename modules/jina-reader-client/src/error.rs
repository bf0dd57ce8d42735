use thiserror::Error;

pub type Result<T> = std::result::Result<T, JinaError>;

#[derive(Debug, Error)]
pub enum JinaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Reader error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response too short: {len} chars (need {min})")]
    TooShort { len: usize, min: usize },
}

impl From<reqwest::Error> for JinaError {
    fn from(err: reqwest::Error) -> Self {
        JinaError::Network(err.to_string())
    }
}
