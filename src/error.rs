use thiserror::Error;

/// Ways a generation request can fail. Every variant is handled the same way by the
/// session (logged, loading state cleared, nothing rendered); the variants exist so the
/// log line says what actually went wrong.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no API key configured (set GEMINI_API_KEY or api_key in the config file)")]
    MissingApiKey,

    #[error("request to generation endpoint failed: {0}")]
    Http(reqwest::Error),

    #[error("generation endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed response: missing {0}")]
    MissingField(&'static str),
}

// reqwest errors render the request URL; strip it so nothing sensitive in it reaches the log.
impl From<reqwest::Error> for GenerateError {
    fn from(e: reqwest::Error) -> Self {
        GenerateError::Http(e.without_url())
    }
}
