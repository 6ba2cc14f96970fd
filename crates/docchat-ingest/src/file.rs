//! Text extraction for uploaded documents.

use std::io::{Cursor, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use docchat_core::{Error, Result};

/// Extensions accepted for upload, as shown to users.
pub const ALLOWED_EXTENSIONS: &str = ".pdf, .txt, .md, .docx";

/// Extracted text shorter than this (after trimming) is treated as empty.
pub const MIN_TEXT_CHARS: usize = 10;

static DOCX_TEXT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<w:t[^>]*>([^<]*)</w:t>").expect("docx run regex"));

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
    Docx,
}

impl DocumentFormat {
    /// Detect the format from a file name's extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::PlainText),
            "md" => Ok(Self::Markdown),
            "docx" => Ok(Self::Docx),
            _ => Err(Error::UnsupportedFormat {
                extension: if ext.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", ext)
                },
                allowed: ALLOWED_EXTENSIONS.to_string(),
            }),
        }
    }
}

/// Extract plain text from the file at `path`, using `file_name` (the name
/// the client declared) to pick the format.
pub fn extract_text(path: &Path, file_name: &str) -> Result<String> {
    let format = DocumentFormat::from_file_name(file_name)?;
    let bytes = std::fs::read(path)?;
    debug!("Extracting {:?} text from {} ({} bytes)", format, file_name, bytes.len());

    let text = extract_bytes(&bytes, format)?;
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(Error::EmptyText);
    }
    Ok(text)
}

/// Extract text from in-memory file contents.
pub fn extract_bytes(bytes: &[u8], format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| Error::Extraction(format!("PDF: {}", e))),
        DocumentFormat::Docx => extract_docx(bytes),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::Extraction(format!("DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::Extraction(format!("DOCX document.xml: {}", e)))?
        .read_to_string(&mut xml)?;

    let runs: Vec<String> = DOCX_TEXT_RUN
        .captures_iter(&xml)
        .map(|cap| decode_xml_entities(&cap[1]))
        .collect();

    Ok(runs.join(" "))
}

fn decode_xml_entities(s: &str) -> String {
    // &amp; last so "&amp;lt;" decodes to "&lt;", not "<".
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default();
            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(b"<Types/>").unwrap();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_file_name("a.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_file_name("notes.md").unwrap(), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::from_file_name("b.txt").unwrap(), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_file_name("c.Docx").unwrap(), DocumentFormat::Docx);

        match DocumentFormat::from_file_name("sheet.csv") {
            Err(Error::UnsupportedFormat { extension, allowed }) => {
                assert_eq!(extension, ".csv");
                assert_eq!(allowed, ALLOWED_EXTENSIONS);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(DocumentFormat::from_file_name("README").is_err());
    }

    #[test]
    fn test_unsupported_format_checked_before_io() {
        // The path does not exist; the format error must win.
        let err = extract_text(Path::new("/nonexistent/file.csv"), "file.csv").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_plain_text_lossy_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"Valid text then \xff a bad byte.").unwrap();

        let text = extract_text(&path, "notes.txt").unwrap();
        assert!(text.starts_with("Valid text then "));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_short_text_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.md");
        std::fs::write(&path, "   tiny  \n").unwrap();

        let err = extract_text(&path, "short.md").unwrap_err();
        assert!(matches!(err, Error::EmptyText));
    }

    #[test]
    fn test_docx_runs_joined_and_decoded() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve">world &amp; friends</w:t></w:r></w:p>
            <w:p><w:r><w:t>a &lt;b&gt; &quot;c&quot; &apos;d&apos;</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_bytes(&docx_bytes(xml), DocumentFormat::Docx).unwrap();
        assert_eq!(text, "Hello world & friends a <b> \"c\" 'd'");
    }

    #[test]
    fn test_docx_via_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tmp-upload");
        std::fs::write(
            &path,
            docx_bytes("<w:t>Quarterly report</w:t><w:t>for the board</w:t>"),
        )
        .unwrap();

        let text = extract_text(&path, "report.docx").unwrap();
        assert_eq!(text, "Quarterly report for the board");
    }

    #[test]
    fn test_docx_without_document_xml_fails() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("other.xml", SimpleFileOptions::default()).unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_bytes(&buf.into_inner(), DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
