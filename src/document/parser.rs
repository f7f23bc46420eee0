use crate::utils::ApiError;

/// Text extracted from one non-empty page of a PDF, 1-based.
pub struct PageText {
    pub page_number: i32,
    pub text: String,
}

/// Outcome of attempting to pull text out of an uploaded PDF.
pub enum ExtractionStatus {
    Ok,
    NoTextExtracted,
}

pub struct ParsedDocument {
    pub pages: Vec<PageText>,
    pub page_count: i32,
    pub status: ExtractionStatus,
}

pub struct DocumentParser;

impl DocumentParser {
    /// Parse a PDF byte stream into page-ordered, non-empty text.
    ///
    /// Pages whose extracted text trims to nothing are dropped entirely: they
    /// never produce chunks and never block a file from registering.
    pub fn parse(bytes: &[u8]) -> Result<ParsedDocument, ApiError> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ApiError::Extraction(format!("invalid PDF: {e}")))?;

        let page_ids = doc.get_pages();
        let page_count = page_ids.len() as i32;

        let mut pages = Vec::new();
        for (page_num, _) in page_ids {
            let text = doc
                .extract_text(&[page_num])
                .unwrap_or_default();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            pages.push(PageText {
                page_number: page_num as i32,
                text: trimmed.to_string(),
            });
        }

        let status = if pages.is_empty() {
            ExtractionStatus::NoTextExtracted
        } else {
            ExtractionStatus::Ok
        };

        Ok(ParsedDocument {
            pages,
            page_count,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_bytes() {
        let err = DocumentParser::parse(b"not a pdf").unwrap_err();
        assert!(matches!(err, ApiError::Extraction(_)));
    }
}
