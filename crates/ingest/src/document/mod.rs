pub mod chunker;
mod pdf;

use std::path::Path;

use thiserror::Error;

pub use pdf::extract_pdf;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF extraction failed: {0}")]
    PdfError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A page of extracted text.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number.
    pub page_number: usize,
    /// The extracted text content.
    pub text: String,
}

/// Result of extracting text from a document.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Original filename.
    pub filename: String,
    /// Pages that produced text. Pages without a text layer are omitted.
    pub pages: Vec<PageContent>,
}

impl ExtractedDocument {
    /// All page text joined with blank lines.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Total character count across all pages.
    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

/// Extract text from a PDF on disk.
pub fn extract_pdf_file(path: &Path) -> Result<ExtractedDocument, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let pages = extract_pdf(&bytes)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf")
        .to_string();
    Ok(ExtractedDocument { filename, pages })
}

/// Flattened extraction contract: `(text, success)`.
///
/// Errors are logged and reported as `("", false)` so callers that only need
/// text can continue with an empty document.
pub fn extract_text_or_empty(path: &Path) -> (String, bool) {
    match extract_pdf_file(path) {
        Ok(doc) => (doc.full_text(), true),
        Err(e) => {
            tracing::error!("PDF extraction error for {}: {}", path.display(), e);
            (String::new(), false)
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[doc(hidden)]
pub mod test_pdf {
    /// Build a minimal single-font PDF with one page per entry in `pages`.
    ///
    /// Object offsets are computed while writing, so the xref table is exact.
    pub fn build(pages: &[&str]) -> Vec<u8> {
        let page_count = pages.len();
        // 1: catalog, 2: pages, 3: font, then (page, contents) pairs.
        let mut objects: Vec<String> = Vec::new();
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        let kids = (0..page_count)
            .map(|i| format!("{} 0 R", 4 + i * 2))
            .collect::<Vec<_>>()
            .join(" ");
        objects.push(format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );
        for (i, text) in pages.iter().enumerate() {
            let contents_id = 5 + i * 2;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {contents_id} 0 R >>"
            ));
            let stream = if text.is_empty() {
                String::new()
            } else {
                let escaped = text
                    .replace('\\', "\\\\")
                    .replace('(', "\\(")
                    .replace(')', "\\)");
                format!("BT /F1 12 Tf 72 720 Td ({escaped}) Tj ET")
            };
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }
        let xref_at = out.len();
        out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
        out.push_str("0000000000 65535 f \n");
        for off in offsets {
            out.push_str(&format!("{off:010} 00000 n \n"));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        ));
        out.into_bytes()
    }
}
