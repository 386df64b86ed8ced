//! EPUB container parsing and chapter segmentation.

pub mod chapter;
pub mod error;
pub mod extractor;
#[cfg(feature = "test-fixtures")]
pub mod fixture;

pub use chapter::{Chapter, UNTITLED_CHAPTER, parse_chapter_html};
pub use error::DocumentParseError;
pub use extractor::{EpubExtractor, extract_chapters, extract_chapters_from_bytes};

/// Default maximum EPUB size accepted from disk: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
