//! Document text extraction.
//!
//! Dispatch is by file extension: PDF via `pdf-extract`, DOCX by reading the
//! `word/document.xml` part out of the zip container, plain text directly.
//! PDF and DOCX parsing are CPU-bound and run on the blocking pool.

use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::info;

use crate::engines::EngineError;

pub async fn extract_document_text(path: &Path) -> Result<String, EngineError> {
    if !path.exists() {
        return Err(EngineError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let raw = match extension.as_str() {
        "pdf" => extract_pdf(path.to_path_buf()).await?,
        "docx" => extract_docx(path.to_path_buf()).await?,
        "txt" | "md" => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Extraction(format!("failed to read text file: {e}")))?,
        other => {
            return Err(EngineError::Extraction(format!(
                "unsupported document format '.{other}'"
            )))
        }
    };

    let text = normalize_text(&raw);
    info!(chars = text.len(), file = %path.display(), "Text extracted");
    Ok(text)
}

async fn extract_pdf(path: PathBuf) -> Result<String, EngineError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path)
            .map_err(|e| EngineError::Extraction(format!("PDF extraction failed: {e}")))
    })
    .await
    .map_err(|e| EngineError::Extraction(format!("extraction task panicked: {e}")))?
}

async fn extract_docx(path: PathBuf) -> Result<String, EngineError> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .map_err(|e| EngineError::Extraction(format!("failed to open DOCX: {e}")))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| EngineError::Extraction(format!("failed to open DOCX archive: {e}")))?;

        let mut document_xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| EngineError::Extraction(format!("DOCX has no document body: {e}")))?
            .read_to_string(&mut document_xml)
            .map_err(|e| EngineError::Extraction(format!("failed to read DOCX body: {e}")))?;

        extract_docx_text(&document_xml)
    })
    .await
    .map_err(|e| EngineError::Extraction(format!("extraction task panicked: {e}")))?
}

/// Collects the text nodes of a WordprocessingML body, one line per paragraph.
fn extract_docx_text(document_xml: &str) -> Result<String, EngineError> {
    let mut reader = Reader::from_str(document_xml);
    let mut out = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| EngineError::Extraction(format!("invalid DOCX XML: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => out.push('\n'),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(EngineError::Extraction(format!("invalid DOCX XML: {e}")));
            }
        }
    }

    Ok(out)
}

/// Normalizes extracted text: unix line endings, no trailing whitespace,
/// at most one blank line in a row.
pub fn normalize_text(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    for line in normalized.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let raw = "Alice Carter\r\n\r\n\r\n\r\nSoftware Engineer  \r\nRust, Tokio\r\n";
        assert_eq!(
            normalize_text(raw),
            "Alice Carter\n\nSoftware Engineer\nRust, Tokio"
        );
    }

    #[test]
    fn test_normalize_trims_trailing_whitespace() {
        assert_eq!(normalize_text("  hello  \nworld\t\n"), "hello\nworld");
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
            <w:p><w:r><w:t>Backend engineer with ten years of Rust.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_docx_text(xml).unwrap();
        assert!(text.contains("Jane Doe\n"));
        assert!(text.contains("Backend engineer"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = extract_document_text(Path::new("/nonexistent/cv.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.exe");
        std::fs::write(&path, b"binary").unwrap();
        let err = extract_document_text(&path).await.unwrap_err();
        assert!(matches!(err, EngineError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_plain_text_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.txt");
        std::fs::write(&path, "John Smith\nSenior engineer, distributed systems.\n").unwrap();
        let text = extract_document_text(&path).await.unwrap();
        assert_eq!(text, "John Smith\nSenior engineer, distributed systems.");
    }
}
