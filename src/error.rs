use thiserror::Error;

/// Failures of the stage-extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("failed to parse CSV: {0}")]
    Parse(String),
    #[error("the CSV is empty or contains no data rows")]
    EmptyData,
    #[error("stage column not found, available columns: {}", .available.join(", "))]
    ColumnNotFound { available: Vec<String> },
    #[error("no stages found in column \"{column}\"")]
    NoStagesFound { column: String },
}

/// The relay reported a non-success outcome. The detail is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("submission failed: {message}")]
pub struct SubmissionError {
    pub message: String,
    pub detail: Option<String>,
}

impl SubmissionError {
    pub fn new(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            message: message.into(),
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OnboardingError {
    #[error("please upload a CSV file (.csv), got \"{0}\"")]
    NotCsv(String),
    #[error("please upload a valid CSV file")]
    EmptyUpload,
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("\"{0}\" is not a known category")]
    UnknownCategory(String),
    #[error("no stage at position {0}")]
    StageOutOfRange(usize),
    #[error("action not available in the current step")]
    WrongStep,
    #[error("required field {0} is empty")]
    MissingField(&'static str),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
