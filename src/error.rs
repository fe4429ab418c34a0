use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    /// Rejected before any decode attempt (wrong file type, bad argument).
    #[error("Invalid file: {0}")]
    Validation(String),

    /// Corrupt file, or nothing left after decoding and filtering.
    #[error("Could not parse file: {0}")]
    Parse(String),

    #[error("Could not read file: {0}")]
    Read(String),

    #[error("Request failed: {0}")]
    Transport(String),

    /// The backend job reached the terminal `failed` status.
    #[error("Import job failed: {0}")]
    JobFailure(String),

    #[error("Import request was accepted but no job id was returned")]
    MissingJobId,

    #[error("An import submission is still pending")]
    SubmissionPending,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ImportError {
    fn from(e: reqwest::Error) -> Self {
        ImportError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
