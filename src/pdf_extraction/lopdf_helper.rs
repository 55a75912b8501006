// lopdf helper - loaded PDF shared by every text source
use anyhow::{anyhow, Result};
use lopdf::{Document, Object, ObjectId};
use once_cell::sync::OnceCell;

/// A PDF held in memory for the duration of one extraction run.
///
/// The lopdf parse is optional: a file lopdf rejects can still be read by the
/// secondary parser, so only the page count has to come from somewhere.
pub struct LoadedPdf {
    bytes: Vec<u8>,
    document: Option<Document>,
    page_count: usize,
    by_pages: OnceCell<std::result::Result<Vec<String>, String>>,
}

impl LoadedPdf {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        match Document::load_mem(&bytes) {
            Ok(document) => {
                let page_count = document.get_pages().len();
                Ok(Self {
                    bytes,
                    document: Some(document),
                    page_count,
                    by_pages: OnceCell::new(),
                })
            }
            Err(lopdf_err) => {
                tracing::warn!("lopdf could not parse document: {}", lopdf_err);
                let pages = pdf_extract_pages(&bytes).map_err(|e| {
                    anyhow!("neither lopdf ({}) nor pdf-extract ({}) could open the document", lopdf_err, e)
                })?;
                let page_count = pages.len();
                Ok(Self {
                    bytes,
                    document: None,
                    page_count,
                    by_pages: OnceCell::with_value(Ok(pages)),
                })
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| anyhow!("document structure unavailable"))
    }

    /// Object id of a 0-based page.
    pub fn page_id(&self, page_index: usize) -> Result<ObjectId> {
        let document = self.document()?;
        document
            .get_pages()
            .get(&((page_index + 1) as u32))
            .copied()
            .ok_or_else(|| anyhow!("Page {} not found", page_index + 1))
    }

    /// Per-page text from pdf-extract, computed once per document.
    pub fn fallback_pages(&self) -> Result<&[String]> {
        let pages = self.by_pages.get_or_init(|| pdf_extract_pages(&self.bytes));
        match pages {
            Ok(pages) => Ok(pages.as_slice()),
            Err(e) => Err(anyhow!("pdf-extract failed: {}", e)),
        }
    }

    /// `/Info /Title`, if the document carries a non-empty one.
    pub fn title(&self) -> Option<String> {
        let document = self.document.as_ref()?;
        let info = match document.trailer.get(b"Info").ok()? {
            Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok()?,
            Object::Dictionary(dict) => dict,
            _ => return None,
        };
        let title = match info.get(b"Title").ok()? {
            Object::String(bytes, _) => decode_text_string(bytes),
            Object::Reference(id) => match document.get_object(*id).ok()? {
                Object::String(bytes, _) => decode_text_string(bytes),
                _ => return None,
            },
            _ => return None,
        };
        let title = title.trim().to_string();
        (!title.is_empty()).then_some(title)
    }
}

// pdf-extract panics on some malformed inputs; contain that to a per-document error.
fn pdf_extract_pages(bytes: &[u8]) -> std::result::Result<Vec<String>, String> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match outcome {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("parser panicked".to_string()),
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-per-char.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf16_title() {
        let bytes = [0xFE, 0xFF, 0x00, b'A', 0x00, b'c', 0x00, b'm', 0x00, b'e'];
        assert_eq!(decode_text_string(&bytes), "Acme");
    }

    #[test]
    fn test_decode_latin1_title() {
        assert_eq!(decode_text_string(b"Annual Report"), "Annual Report");
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(LoadedPdf::from_bytes(b"not a pdf at all".to_vec()).is_err());
    }
}
