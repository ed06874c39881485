use thiserror::Error;

/// Failure of a single call to the generation backend.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure of the two-step image pipeline, keeping track of which step broke.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image generation failed: {0}")]
    Generation(#[source] GenerationError),

    #[error("image download failed: {0}")]
    Fetch(#[source] GenerationError),
}
