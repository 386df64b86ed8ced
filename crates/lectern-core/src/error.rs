use lectern_epub::DocumentParseError;
use lectern_llm::LlmError;

use crate::exchange::ExchangeError;

/// A request that cannot be acted on as supplied. Never reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInputError {
    #[error("Missing question")]
    EmptyQuestion,

    #[error("Missing chapter content")]
    EmptyChapterContent,

    #[error("No file part")]
    MissingFile,

    #[error("No selected file")]
    EmptyFilename,

    #[error("Invalid file type: {0}")]
    NotAnEpub(String),

    #[error("Invalid filename: {0}")]
    UnsafeFilename(String),

    #[error("Malformed request: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("No chapters loaded")]
    NoChapters,

    #[error("Chapter index out of range")]
    ChapterOutOfRange { index: usize, len: usize },
}

/// The chat backend failed before producing any output.
#[derive(Debug, thiserror::Error)]
#[error("chat backend unavailable: {0}")]
pub struct BackendUnavailableError(#[from] pub LlmError);

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    BackendUnavailable(#[from] BackendUnavailableError),

    #[error(transparent)]
    Document(#[from] DocumentParseError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
