use std::panic::{catch_unwind, AssertUnwindSafe};

use super::{ExtractionError, PageContent};

/// Extract per-page text from PDF bytes.
///
/// Pages whose text layer is empty (scanned images, blank pages) are dropped;
/// a PDF without any text yields `Ok(vec![])` rather than an error.
pub fn extract_pdf(bytes: &[u8]) -> Result<Vec<PageContent>, ExtractionError> {
    // pdf-extract panics on some malformed inputs instead of returning Err.
    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| ExtractionError::PdfError("parser panicked on malformed PDF".to_string()))?
        .map_err(|e| ExtractionError::PdfError(e.to_string()))?;

    if text.trim().is_empty() {
        tracing::warn!("PDF parsed but contains no extractable text");
        return Ok(Vec::new());
    }

    // pdf-extract returns all text as one string; form feeds separate pages.
    let pages: Vec<PageContent> = if text.contains('\x0C') {
        text.split('\x0C')
            .enumerate()
            .filter(|(_, page_text)| !page_text.trim().is_empty())
            .map(|(i, page_text)| PageContent {
                page_number: i + 1,
                text: page_text.trim().to_string(),
            })
            .collect()
    } else {
        vec![PageContent {
            page_number: 1,
            text: text.trim().to_string(),
        }]
    };

    tracing::debug!("Extracted {} pages with text", pages.len());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_pdf;

    #[test]
    fn extracts_single_page() {
        let pages = extract_pdf(&test_pdf::build(&["Hello from a tiny PDF."])).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].text.contains("Hello"));
    }

    #[test]
    fn blank_pages_contribute_nothing() {
        let pages = extract_pdf(&test_pdf::build(&["", "Second page text.", ""])).unwrap();
        assert!(pages.iter().all(|p| !p.text.trim().is_empty()));
        let joined: String = pages.iter().map(|p| p.text.as_str()).collect();
        assert!(joined.contains("Second page"));
    }

    #[test]
    fn pdf_without_text_is_empty_not_error() {
        let pages = extract_pdf(&test_pdf::build(&[""])).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn invalid_bytes_are_an_error() {
        let err = extract_pdf(b"%PDF-1.4 truncated").unwrap_err();
        assert!(matches!(err, ExtractionError::PdfError(_)));
    }
}
