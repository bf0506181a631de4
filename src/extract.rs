use std::fs;
use std::path::Path;

use crate::error::ExtractError;

/// Page separator emitted by PDF text tools and accepted in `.txt` files.
const PAGE_BREAK: char = '\u{000C}';

/// Best-effort document to page-text conversion.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// Reads `.pdf` documents page by page through `pdf-extract`. Pre-extracted
/// `.txt` documents are split into pages on form feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    pub fn supports(path: &Path) -> bool {
        matches!(extension(path).as_deref(), Some("pdf") | Some("txt"))
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let pages = match extension(path).as_deref() {
            Some("pdf") => {
                let bytes = fs::read(path)?;
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
                    .map_err(|err| ExtractError::Pdf(err.to_string()))?
            }
            Some("txt") => split_pages(&fs::read_to_string(path)?),
            _ => return Err(ExtractError::Unsupported(path.display().to_string())),
        };

        non_blank(pages)
    }
}

fn split_pages(text: &str) -> Vec<String> {
    text.split(PAGE_BREAK).map(str::to_string).collect()
}

fn non_blank(pages: Vec<String>) -> Result<Vec<String>, ExtractError> {
    if pages.iter().all(|page| page.trim().is_empty()) {
        return Err(ExtractError::Empty);
    }
    Ok(pages)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_supported_extensions() {
        assert!(DocumentExtractor::supports(Path::new("a/transkrip.PDF")));
        assert!(DocumentExtractor::supports(Path::new("transkrip.txt")));
        assert!(!DocumentExtractor::supports(Path::new("transkrip.docx")));
        assert!(!DocumentExtractor::supports(Path::new("README")));
    }

    #[test]
    fn splits_text_documents_on_form_feeds() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("two-pages.txt");
        fs::write(&path, "page one\u{000C}page two").expect("write fixture");

        let pages = DocumentExtractor.extract(&path).expect("extracts");
        assert_eq!(pages, vec!["page one".to_string(), "page two".to_string()]);
    }

    #[test]
    fn page_lists_are_kept_as_extracted() {
        let pages = vec!["page one\n".to_string(), "page two\n".to_string()];
        assert_eq!(non_blank(pages.clone()).expect("pages"), pages);
        assert!(matches!(
            non_blank(vec![" ".to_string(), "\n".to_string()]),
            Err(ExtractError::Empty)
        ));
        assert!(matches!(non_blank(Vec::new()), Err(ExtractError::Empty)));
    }

    #[test]
    fn blank_documents_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("blank.txt");
        fs::write(&path, "  \n\u{000C}\n").expect("write fixture");

        assert!(matches!(
            DocumentExtractor.extract(&path),
            Err(ExtractError::Empty)
        ));
    }
}
