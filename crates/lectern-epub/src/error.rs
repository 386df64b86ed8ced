#[derive(Debug, thiserror::Error)]
pub enum DocumentParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("malformed EPUB container: {0}")]
    Container(String),

    #[error("spine item '{0}' is missing from the archive")]
    UnreadableItem(String),
}
