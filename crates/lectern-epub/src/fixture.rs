//! Minimal EPUB archive builder for tests.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

struct Item {
    id: String,
    href: String,
    mime: String,
    body: Vec<u8>,
    properties: Option<String>,
    in_spine: bool,
}

/// Builds an EPUB 3 container in memory.
///
/// Items are written to the manifest in insertion order. The spine lists the
/// chapter items in insertion order unless [`EpubFixture::spine_order`] says
/// otherwise.
#[derive(Default)]
pub struct EpubFixture {
    items: Vec<Item>,
    spine: Option<Vec<String>>,
}

impl EpubFixture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an XHTML spine item whose `<body>` contains `body_html`.
    #[must_use]
    pub fn chapter(mut self, id: &str, body_html: &str) -> Self {
        let doc = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>{id}</title>\
             <link rel=\"stylesheet\" href=\"style.css\"/></head><body>{body_html}</body></html>"
        );
        self.items.push(Item {
            id: id.to_owned(),
            href: format!("{id}.xhtml"),
            mime: "application/xhtml+xml".into(),
            body: doc.into_bytes(),
            properties: None,
            in_spine: true,
        });
        self
    }

    /// Add a spine item whose full document bytes are given verbatim, for
    /// content in encodings other than UTF-8.
    #[must_use]
    pub fn raw_chapter(mut self, id: &str, document: &[u8]) -> Self {
        self.items.push(Item {
            id: id.to_owned(),
            href: format!("{id}.xhtml"),
            mime: "application/xhtml+xml".into(),
            body: document.to_vec(),
            properties: None,
            in_spine: true,
        });
        self
    }

    /// Add a stylesheet that is listed in the manifest but not the spine.
    #[must_use]
    pub fn stylesheet(mut self, id: &str, css: &str) -> Self {
        self.items.push(Item {
            id: id.to_owned(),
            href: "style.css".into(),
            mime: "text/css".into(),
            body: css.as_bytes().to_vec(),
            properties: None,
            in_spine: false,
        });
        self
    }

    /// Add an image resource outside the spine.
    #[must_use]
    pub fn image(mut self, id: &str, bytes: &[u8]) -> Self {
        self.items.push(Item {
            id: id.to_owned(),
            href: format!("{id}.png"),
            mime: "image/png".into(),
            body: bytes.to_vec(),
            properties: None,
            in_spine: false,
        });
        self
    }

    /// Add an EPUB 3 navigation document outside the spine.
    #[must_use]
    pub fn nav(self, id: &str) -> Self {
        self.push_nav(id, false)
    }

    /// Add an EPUB 3 navigation document that is also listed in the spine.
    #[must_use]
    pub fn nav_in_spine(self, id: &str) -> Self {
        self.push_nav(id, true)
    }

    /// List the spine by id in this order instead of insertion order.
    #[must_use]
    pub fn spine_order(mut self, ids: &[&str]) -> Self {
        self.spine = Some(ids.iter().map(|id| (*id).to_owned()).collect());
        self
    }

    fn push_nav(mut self, id: &str, in_spine: bool) -> Self {
        let doc = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\
             <head><title>Contents</title></head><body><nav epub:type=\"toc\"><h1>Contents</h1>\
             <ol><li><a href=\"c1.xhtml\">One</a></li></ol></nav></body></html>";
        self.items.push(Item {
            id: id.to_owned(),
            href: format!("{id}.xhtml"),
            mime: "application/xhtml+xml".into(),
            body: doc.as_bytes().to_vec(),
            properties: Some("nav".into()),
            in_spine,
        });
        self
    }

    fn package_document(&self) -> String {
        let mut opf = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"uid\">\n\
             <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n\
             <dc:identifier id=\"uid\">urn:uuid:00000000-0000-4000-8000-000000000000</dc:identifier>\n\
             <dc:title>Fixture Book</dc:title>\n\
             <dc:language>en</dc:language>\n\
             </metadata>\n<manifest>\n\
             <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
        );
        for item in &self.items {
            let props = item
                .properties
                .as_deref()
                .map(|p| format!(" properties=\"{p}\""))
                .unwrap_or_default();
            let _ = writeln!(
                opf,
                "<item id=\"{}\" href=\"{}\" media-type=\"{}\"{props}/>",
                item.id, item.href, item.mime
            );
        }
        opf.push_str("</manifest>\n<spine toc=\"ncx\">\n");
        for item in self.spine_items() {
            let _ = writeln!(opf, "<itemref idref=\"{}\"/>", item.id);
        }
        opf.push_str("</spine>\n</package>\n");
        opf
    }

    fn spine_items(&self) -> Vec<&Item> {
        match &self.spine {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.items.iter().find(|i| &i.id == id))
                .collect(),
            None => self.items.iter().filter(|i| i.in_spine).collect(),
        }
    }

    fn ncx(&self) -> String {
        let mut ncx = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n\
             <head><meta name=\"dtb:uid\" content=\"urn:uuid:00000000-0000-4000-8000-000000000000\"/></head>\n\
             <docTitle><text>Fixture Book</text></docTitle>\n<navMap>\n",
        );
        for (order, item) in self.spine_items().into_iter().enumerate() {
            let _ = writeln!(
                ncx,
                "<navPoint id=\"np{order}\" playOrder=\"{}\"><navLabel><text>{}</text></navLabel>\
                 <content src=\"{}\"/></navPoint>",
                order + 1,
                item.id,
                item.href
            );
        }
        ncx.push_str("</navMap>\n</ncx>\n");
        ncx
    }

    /// Serialize the container to EPUB bytes.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory zip writer fails, which only happens on
    /// allocation failure.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        self.try_build().expect("in-memory EPUB fixture must serialize")
    }

    fn try_build(&self) -> zip::result::ZipResult<Vec<u8>> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", stored)?;
        zip.write_all(
            b"<?xml version=\"1.0\"?>\n\
              <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n\
              <rootfiles><rootfile full-path=\"OEBPS/content.opf\" \
              media-type=\"application/oebps-package+xml\"/></rootfiles>\n</container>\n",
        )?;

        zip.start_file("OEBPS/content.opf", stored)?;
        zip.write_all(self.package_document().as_bytes())?;

        zip.start_file("OEBPS/toc.ncx", stored)?;
        zip.write_all(self.ncx().as_bytes())?;

        for item in &self.items {
            zip.start_file(format!("OEBPS/{}", item.href), stored)?;
            zip.write_all(&item.body)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Write the container to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }
}
