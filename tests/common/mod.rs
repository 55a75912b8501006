// In-memory PDFs for integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use pdfbrief::pdf_extraction::ocr_engine::EmbeddedImageRasterizer;
use pdfbrief::pdf_extraction::{
    Extractor, FallbackSource, NativeSource, OcrEngine, OcrSource, TextSource,
};

pub enum PageSpec<'a> {
    /// One text line per entry, Helvetica 11pt.
    Text(&'a [&'a str]),
    /// A full-page grayscale image and no text layer.
    Scan,
    Blank,
}

pub fn build_pdf(pages: &[PageSpec], title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for spec in pages {
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        let mut operations = Vec::new();
        match spec {
            PageSpec::Text(lines) => {
                for (i, line) in lines.iter().enumerate() {
                    let y = 720 - 16 * i as i64;
                    operations.push(Operation::new("BT", vec![]));
                    operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
                    operations.push(Operation::new("Td", vec![72.into(), y.into()]));
                    operations.push(Operation::new("Tj", vec![Object::string_literal(format!("{} ", line))]));
                    operations.push(Operation::new("ET", vec![]));
                }
            }
            PageSpec::Scan => {
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 16,
                        "Height" => 16,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    vec![200u8; 256],
                ));
                resources.set("XObject", dictionary! { "Im1" => image_id });
                operations.push(Operation::new("q", vec![]));
                operations.push(Operation::new(
                    "cm",
                    vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
                ));
                operations.push(Operation::new("Do", vec!["Im1".into()]));
                operations.push(Operation::new("Q", vec![]));
            }
            PageSpec::Blank => {}
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Stands in for tesseract: "reads" a fixed text from any non-empty image.
pub struct ScriptedOcr(pub &'static str);

impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        if image.width() == 0 || image.height() == 0 {
            bail!("empty image");
        }
        Ok(self.0.to_string())
    }
}

/// The production chain with the OCR engine swapped out.
pub fn extractor_with_ocr(text: &'static str, min_chars: usize) -> Extractor {
    let sources: Vec<Box<dyn TextSource>> = vec![
        Box::new(NativeSource),
        Box::new(FallbackSource),
        Box::new(OcrSource::new(
            vec![Box::new(EmbeddedImageRasterizer)],
            Box::new(ScriptedOcr(text)),
        )),
    ];
    Extractor::with_sources(sources, min_chars)
}

pub const SCANNED_TEXT: &str = "Scanned statement: the order book reached a record 3.1 billion at year end. \
                                Backlog coverage now exceeds eighteen months of revenue.";

pub const REPORT_PAGE_ONE: &[&str] = &[
    "Acme Industries delivered a strong year across all of its businesses.",
    "Total revenue increased 12% to $4.2 million on higher export volumes.",
    "EBITDA margin expanded to 18.5% as input costs eased in the second half.",
];

pub const REPORT_PAGE_THREE: &[&str] = &[
    "Key risks include currency volatility and raw material price uncertainty.",
    "The Board recommended a final dividend of 2.5 per share to shareholders.",
    "Our strategy prioritises growth in new product segments and overseas markets.",
];
