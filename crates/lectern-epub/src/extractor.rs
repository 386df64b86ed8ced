use std::borrow::Cow;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use epub::doc::{EpubDoc, ResourceItem};

use crate::DEFAULT_MAX_FILE_SIZE;
use crate::chapter::{Chapter, parse_chapter_html};
use crate::error::DocumentParseError;

const DOCUMENT_MIME_TYPES: [&str; 2] = ["application/xhtml+xml", "text/html"];

/// Manifest property marking the EPUB 3 navigation document.
const NAV_PROPERTY: &str = "nav";

/// How far into a document to look for an XML encoding declaration.
const XML_DECL_SCAN_LEN: usize = 1024;

pub struct EpubExtractor {
    pub max_file_size: u64,
}

impl Default for EpubExtractor {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl EpubExtractor {
    /// Extract chapters from an EPUB file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, larger than `max_file_size`,
    /// or not a readable EPUB container.
    pub fn extract_path(&self, path: &Path) -> Result<Vec<Chapter>, DocumentParseError> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > self.max_file_size {
            return Err(DocumentParseError::FileTooLarge(meta.len()));
        }

        let doc = EpubDoc::new(path).map_err(|e| DocumentParseError::Container(e.to_string()))?;
        tracing::info!(path = %path.display(), "opened EPUB container");
        collect_chapters(doc)
    }

    /// Extract chapters from an in-memory EPUB archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer exceeds `max_file_size` or is not a
    /// readable EPUB container.
    pub fn extract_bytes(&self, bytes: Vec<u8>) -> Result<Vec<Chapter>, DocumentParseError> {
        let len = bytes.len() as u64;
        if len > self.max_file_size {
            return Err(DocumentParseError::FileTooLarge(len));
        }

        let doc = EpubDoc::from_reader(Cursor::new(bytes))
            .map_err(|e| DocumentParseError::Container(e.to_string()))?;
        collect_chapters(doc)
    }
}

/// Extract chapters from an EPUB file using the default size limit.
///
/// # Errors
///
/// See [`EpubExtractor::extract_path`].
pub fn extract_chapters(path: &Path) -> Result<Vec<Chapter>, DocumentParseError> {
    EpubExtractor::default().extract_path(path)
}

/// Extract chapters from EPUB bytes using the default size limit.
///
/// # Errors
///
/// See [`EpubExtractor::extract_bytes`].
pub fn extract_chapters_from_bytes(bytes: Vec<u8>) -> Result<Vec<Chapter>, DocumentParseError> {
    EpubExtractor::default().extract_bytes(bytes)
}

/// Walk the spine in reading order, turning every content document into a
/// chapter. Navigation documents and non-XHTML items are skipped.
fn collect_chapters<R: Read + Seek>(
    mut doc: EpubDoc<R>,
) -> Result<Vec<Chapter>, DocumentParseError> {
    let document_ids: Vec<String> = doc
        .spine
        .iter()
        .filter(|item| {
            doc.resources
                .get(&item.idref)
                .is_some_and(is_content_document)
        })
        .map(|item| item.idref.clone())
        .collect();

    let skipped = doc.spine.len() - document_ids.len();
    let mut chapters = Vec::with_capacity(document_ids.len());

    for id in document_ids {
        let (bytes, _mime) = doc
            .get_resource(&id)
            .ok_or_else(|| DocumentParseError::UnreadableItem(id.clone()))?;
        let html = decode_document(&id, &bytes);
        let chapter = parse_chapter_html(&html);
        tracing::debug!(
            id = %id,
            title = %chapter.title,
            content_len = chapter.content.len(),
            "parsed chapter"
        );
        chapters.push(chapter);
    }

    tracing::info!(
        chapters = chapters.len(),
        skipped_non_documents = skipped,
        "finished EPUB chapter extraction"
    );
    Ok(chapters)
}

fn is_document_mime(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    DOCUMENT_MIME_TYPES.contains(&mime.as_str())
}

fn is_nav_document(res: &ResourceItem) -> bool {
    res.properties
        .as_deref()
        .is_some_and(|props| props.split_whitespace().any(|p| p == NAV_PROPERTY))
}

fn is_content_document(res: &ResourceItem) -> bool {
    is_document_mime(&res.mime) && !is_nav_document(res)
}

/// Decode a content document to text.
///
/// A byte order mark wins, then the XML declaration's `encoding`, then UTF-8.
/// Malformed sequences become U+FFFD rather than failing the book.
fn decode_document<'a>(id: &str, bytes: &'a [u8]) -> Cow<'a, str> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| declared_encoding(bytes))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(id, encoding = used.name(), "content document has malformed bytes");
    } else if used != UTF_8 {
        tracing::debug!(id, encoding = used.name(), "decoded non-UTF-8 content document");
    }
    text
}

/// Encoding named by `<?xml ... encoding="..."?>`, if the label is known.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(XML_DECL_SCAN_LEN)];
    let head = String::from_utf8_lossy(head);
    let decl = head.trim_start().strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let label = &rest[1..][..rest[1..].find(quote)?];
    Encoding::for_label(label.trim().as_bytes())
}
