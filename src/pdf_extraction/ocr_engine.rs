// OCR for image-only pages: rasterize the page, then hand the image to an OCR engine
use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Runtime;

use super::extraction_router::TextSource;
use super::lopdf_helper::LoadedPdf;
use crate::config::OcrConfig;
use crate::types::ExtractionMethod;

/// Produces an image of one page.
pub trait PageRasterizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn rasterize(&self, pdf: &LoadedPdf, page_index: usize) -> Result<DynamicImage>;
}

/// Capability `image -> text`.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Third link of the extraction chain.
pub struct OcrSource {
    rasterizers: Vec<Box<dyn PageRasterizer>>,
    engine: Box<dyn OcrEngine>,
}

impl OcrSource {
    pub fn new(rasterizers: Vec<Box<dyn PageRasterizer>>, engine: Box<dyn OcrEngine>) -> Self {
        Self { rasterizers, engine }
    }

    /// Embedded scan images first, then the external rasterizer, then tesseract.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        let runner = CommandRunner::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(
            vec![
                Box::new(EmbeddedImageRasterizer),
                Box::new(PdftoppmRasterizer {
                    binary: config.rasterizer_binary.clone(),
                    dpi: config.dpi,
                    runner: runner.clone(),
                }),
            ],
            Box::new(TesseractEngine {
                binary: config.binary.clone(),
                language: config.language.clone(),
                runner,
            }),
        ))
    }

    fn rasterize(&self, pdf: &LoadedPdf, page_index: usize) -> Result<DynamicImage> {
        let mut failures = Vec::new();
        for rasterizer in &self.rasterizers {
            match rasterizer.rasterize(pdf, page_index) {
                Ok(image) => {
                    tracing::debug!(
                        "page {} rasterized by {} ({}x{})",
                        page_index + 1,
                        rasterizer.name(),
                        image.width(),
                        image.height()
                    );
                    return Ok(image);
                }
                Err(e) => failures.push(format!("{}: {}", rasterizer.name(), e)),
            }
        }
        Err(anyhow!("no rasterizer produced an image ({})", failures.join("; ")))
    }
}

impl TextSource for OcrSource {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn extract(&self, pdf: &LoadedPdf, page_index: usize) -> Result<String> {
        let image = self.rasterize(pdf, page_index)?;
        self.engine
            .recognize(&image)
            .with_context(|| format!("{} failed on page {}", self.engine.name(), page_index + 1))
    }
}

/// Runs external commands on a private current-thread runtime with a hard timeout.
/// A timed-out child is killed when its future is dropped.
#[derive(Clone)]
pub struct CommandRunner {
    runtime: std::sync::Arc<Runtime>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: std::sync::Arc::new(runtime),
            timeout,
        })
    }

    pub fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        let timeout = self.timeout;
        let output = self.runtime.block_on(async move {
            tokio::time::timeout(timeout, command.output()).await
        });
        match output {
            Ok(Ok(output)) if output.status.success() => Ok(output),
            Ok(Ok(output)) => bail!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Ok(Err(e)) => Err(anyhow!("failed to launch {}: {}", program, e)),
            Err(_) => bail!("{} timed out after {:?}", program, timeout),
        }
    }
}

/// True if `binary --version` can be executed.
pub fn command_available(binary: &str) -> bool {
    std::process::Command::new(binary)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}

pub struct TesseractEngine {
    binary: String,
    language: String,
    runner: CommandRunner,
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("pdfbrief-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(file.path(), ImageFormat::Png)?;

        let args = vec![
            file.path().to_string_lossy().into_owned(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];
        let output = self.runner.run(&self.binary, &args)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Renders the page with poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    binary: String,
    dpi: u32,
    runner: CommandRunner,
}

impl PageRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    fn rasterize(&self, pdf: &LoadedPdf, page_index: usize) -> Result<DynamicImage> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, pdf.bytes())?;
        let prefix = dir.path().join("page");
        let page = (page_index + 1).to_string();

        let args = vec![
            "-png".to_string(),
            "-r".to_string(),
            self.dpi.to_string(),
            "-f".to_string(),
            page.clone(),
            "-l".to_string(),
            page,
            "-singlefile".to_string(),
            input.to_string_lossy().into_owned(),
            prefix.to_string_lossy().into_owned(),
        ];
        self.runner.run(&self.binary, &args)?;
        Ok(image::open(prefix.with_extension("png"))?)
    }
}

/// Scanned pages are usually one full-page image XObject; decode the largest one.
pub struct EmbeddedImageRasterizer;

impl PageRasterizer for EmbeddedImageRasterizer {
    fn name(&self) -> &'static str {
        "embedded-image"
    }

    fn rasterize(&self, pdf: &LoadedPdf, page_index: usize) -> Result<DynamicImage> {
        let document = pdf.document()?;
        let page_id = pdf.page_id(page_index)?;
        let page = document.get_object(page_id)?.as_dict()?;

        let stream = largest_image(document, page)
            .ok_or_else(|| anyhow!("page {} has no image XObject", page_index + 1))?;
        decode_image(stream)
    }
}

fn resolve<'a>(document: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => document.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match resolve(document, dict.get(key).ok()?) {
        Object::Integer(i) => Some(*i),
        Object::Real(f) => Some(*f as i64),
        _ => None,
    }
}

fn largest_image<'a>(document: &'a Document, page: &'a Dictionary) -> Option<&'a Stream> {
    let resources = resolve(document, page.get(b"Resources").ok()?).as_dict().ok()?;
    let xobjects = resolve(document, resources.get(b"XObject").ok()?).as_dict().ok()?;

    xobjects
        .iter()
        .filter_map(|(_name, obj)| match resolve(document, obj) {
            Object::Stream(stream) => Some(stream),
            _ => None,
        })
        .filter(|stream| {
            matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
        })
        .max_by_key(|stream| {
            let width = number(document, &stream.dict, b"Width").unwrap_or(0);
            let height = number(document, &stream.dict, b"Height").unwrap_or(0);
            width.saturating_mul(height)
        })
}

fn filter_names(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(stream: &Stream) -> Result<DynamicImage> {
    let filters = filter_names(stream);
    if filters.iter().any(|f| f == b"DCTDecode" || f == b"JPXDecode") {
        if filters.len() != 1 {
            bail!("chained image filters are not supported");
        }
        return Ok(image::load_from_memory(&stream.content)?);
    }

    let width = match stream.dict.get(b"Width") {
        Ok(Object::Integer(w)) if *w > 0 => *w as u32,
        _ => bail!("image has no usable /Width"),
    };
    let height = match stream.dict.get(b"Height") {
        Ok(Object::Integer(h)) if *h > 0 => *h as u32,
        _ => bail!("image has no usable /Height"),
    };
    if !matches!(stream.dict.get(b"BitsPerComponent"), Ok(Object::Integer(8))) {
        bail!("only 8-bit images are decoded");
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content()?
    };

    match stream.dict.get(b"ColorSpace") {
        Ok(Object::Name(cs)) if cs == b"DeviceGray" => GrayImage::from_raw(width, height, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| anyhow!("gray image data is truncated")),
        Ok(Object::Name(cs)) if cs == b"DeviceRGB" => RgbImage::from_raw(width, height, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| anyhow!("RGB image data is truncated")),
        _ => bail!("unsupported image color space"),
    }
}
