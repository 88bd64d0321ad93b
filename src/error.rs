use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Recognition failed: {0}")]
    RecognitionFailed(String),
    #[error("Understanding failed: {0}")]
    UnderstandingFailed(String),
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("Pipeline unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unknown media id: {0}")]
    UnknownMedia(String),
    #[error("Media fetch failed: {0}")]
    FetchFailed(String),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt not found: {0}")]
    NotFound(String),
    #[error("Prompt unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("Prompt decode failed: {0}")]
    Decode(String),
}
