// Primary parser: text layer via lopdf
use anyhow::Result;
use lopdf::content::Content;
use lopdf::Object;

use super::extraction_router::TextSource;
use super::lopdf_helper::{decode_text_string, LoadedPdf};
use crate::types::ExtractionMethod;

/// Reads the page's text layer with lopdf's font-aware extractor, falling back to
/// a raw walk over the text-showing operators when font decoding fails.
pub struct NativeSource;

impl TextSource for NativeSource {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Native
    }

    fn extract(&self, pdf: &LoadedPdf, page_index: usize) -> Result<String> {
        let document = pdf.document()?;
        match document.extract_text(&[(page_index + 1) as u32]) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => extract_text_operators(pdf, page_index),
            Err(e) => {
                tracing::debug!(
                    "lopdf extract_text failed on page {}: {}; walking operators",
                    page_index + 1,
                    e
                );
                extract_text_operators(pdf, page_index)
            }
        }
    }
}

/// Collect strings shown by Tj/TJ/'/" and break lines on text positioning.
fn extract_text_operators(pdf: &LoadedPdf, page_index: usize) -> Result<String> {
    let document = pdf.document()?;
    let page_id = pdf.page_id(page_index)?;
    let content = Content::decode(&document.get_page_content(page_id)?)?;

    let mut text = String::new();
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" | "TJ" | "'" | "\"" => {
                for operand in &operation.operands {
                    if let Some(s) = string_operand(operand) {
                        text.push_str(&s);
                    }
                }
            }
            "Td" | "TD" | "T*" | "ET" => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }
    Ok(text)
}

fn string_operand(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Array(items) => {
            let mut out = String::new();
            for item in items {
                match item {
                    Object::String(bytes, _) => out.push_str(&decode_text_string(bytes)),
                    // Large negative kerning is how many producers encode a word gap.
                    Object::Integer(n) if *n < -200 => out.push(' '),
                    Object::Real(n) if *n < -200.0 => out.push(' '),
                    _ => {}
                }
            }
            (!out.is_empty()).then_some(out)
        }
        _ => None,
    }
}
