//! Document ingestion: file path in, plain text out.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use scraper::Html;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported document format: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF parsing failed for {}: {reason}", .path.display())]
    Pdf { path: PathBuf, reason: String },
}

/// Formats recognised by file extension (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Html,
    Text,
    Pdf,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "htm" | "html" => Some(Self::Html),
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Load a document and return its text content.
pub fn load_document(path: &Path) -> Result<String, IngestError> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| IngestError::UnsupportedExtension(path.to_path_buf()))?;

    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match format {
        DocumentFormat::Text => String::from_utf8_lossy(&bytes).into_owned(),
        DocumentFormat::Html => html_to_text(&String::from_utf8_lossy(&bytes)),
        DocumentFormat::Pdf => pdf_to_text(&bytes).map_err(|reason| IngestError::Pdf {
            path: path.to_path_buf(),
            reason,
        })?,
    };

    tracing::debug!(
        path = %path.display(),
        format = ?format,
        chars = text.len(),
        "Document loaded"
    );
    Ok(text)
}

/// Visible text nodes, one per line. Script and style content is dropped.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    lines.join("\n")
}

fn pdf_to_text(bytes: &[u8]) -> Result<String, String> {
    let pages = without_panics(|| pdf_extract::extract_text_from_mem_by_pages(bytes))?
        .map_err(|e| e.to_string())?;
    Ok(pages.join("\n"))
}

/// Run the PDF parser with panics turned into errors. pdf-extract panics on
/// font dictionaries it does not expect (no `/BaseFont`, Type0 without
/// descendants, unknown encodings).
fn without_panics<T>(parse: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(parse)).map_err(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        match detail {
            Some(detail) => format!("pdf parser panicked: {detail}"),
            None => "pdf parser panicked".to_string(),
        }
    })
}

/// Document identifier: the file name without its extension.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Every regular file under `dir`, recursively, in sorted path order.
pub fn collect_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_case_insensitively() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/CN1.HTML")), Some(DocumentFormat::Html));
        assert_eq!(DocumentFormat::from_path(Path::new("b.htm")), Some(DocumentFormat::Html));
        assert_eq!(DocumentFormat::from_path(Path::new("c.Txt")), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_path(Path::new("d.pdf")), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_path(Path::new("e.docx")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patent.docx");
        fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_document(&path),
            Err(IngestError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn loads_plain_text_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("US1.txt");
        let mut bytes = "Example 1. Li₂S was milled".as_bytes().to_vec();
        bytes.push(0xff);
        fs::write(&path, bytes).unwrap();

        let text = load_document(&path).unwrap();
        assert!(text.starts_with("Example 1. Li₂S was milled"));
        assert!(text.ends_with('\u{FFFD}'));
    }

    #[test]
    fn html_drops_scripts_and_styles() {
        let html = r#"<html><head><title>CN123</title><style>p { color: red }</style></head>
            <body><script>var x = 1;</script><p>Example 1</p><p>  Li6PS5Cl  </p></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "CN123\nExample 1\nLi6PS5Cl");
    }

    #[test]
    fn loads_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("JP2.htm");
        fs::write(&path, "<p>solid electrolyte</p>").unwrap();
        assert_eq!(load_document(&path).unwrap(), "solid electrolyte");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn invalid_pdf_is_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(load_document(&path), Err(IngestError::Pdf { .. })));
    }

    #[test]
    fn parser_panic_becomes_error() {
        let err = without_panics::<()>(|| panic!("no BaseFont")).unwrap_err();
        assert_eq!(err, "pdf parser panicked: no BaseFont");

        let err = without_panics::<()>(|| panic!("{} descendants", 0)).unwrap_err();
        assert_eq!(err, "pdf parser panicked: 0 descendants");

        assert_eq!(without_panics(|| 7), Ok(7));
    }

    #[test]
    fn pdf_with_incomplete_font_is_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CN9.pdf");
        fs::write(&path, fixtures::pdf_with_incomplete_font()).unwrap();
        assert!(matches!(load_document(&path), Err(IngestError::Pdf { .. })));
    }

    #[test]
    fn collects_files_recursively_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b").join("x.txt"), "").unwrap();
        fs::write(dir.path().join("c.html"), "").unwrap();
        fs::write(dir.path().join("a.pdf"), "").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.pdf"),
                PathBuf::from("b").join("x.txt"),
                PathBuf::from("c.html")
            ]
        );
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(stem_of(Path::new("/in/sub/CN114.html")), "CN114");
    }
}
