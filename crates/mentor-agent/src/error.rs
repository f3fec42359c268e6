use thiserror::Error;

#[derive(Debug, Error)]
pub enum MentorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mentor endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}
