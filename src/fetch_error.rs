#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Login failed: {0}")]
    Login(String),
    #[error("Empty response from {0}")]
    EmptyResponse(String),
    #[error("Failed to decode JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse HTML data")]
    ParseError,
    #[error("Failed to parse number: {0}")]
    NumberError(String),
    #[error("Malformed meter row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
    #[error("Residence id could not be determined")]
    MissingResidence,
}
