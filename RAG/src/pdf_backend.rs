use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Rendering engine behind the page extractor.
///
/// Implementations must be safe to call for different pages concurrently.
pub trait PdfBackend: Send + Sync {
    /// Raw text of every page, in document order.
    fn page_texts(&self, pdf_path: &Path) -> Result<Vec<String>>;

    /// Rasterises one page (1-based) to PNG bytes.
    fn render_png(&self, pdf_path: &Path, page_number: u32, dpi: u32) -> Result<Vec<u8>>;
}

/// Text through `pdf-extract`, images through poppler's `pdftoppm`.
pub struct PopplerBackend {
    pdftoppm: PathBuf,
}

impl PopplerBackend {
    pub fn new() -> Self {
        Self {
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }

    pub fn with_binary(pdftoppm: impl Into<PathBuf>) -> Self {
        Self {
            pdftoppm: pdftoppm.into(),
        }
    }
}

impl Default for PopplerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBackend for PopplerBackend {
    fn page_texts(&self, pdf_path: &Path) -> Result<Vec<String>> {
        pdf_extract::extract_text_by_pages(pdf_path)
            .with_context(|| format!("failed to extract text from {}", pdf_path.display()))
    }

    fn render_png(&self, pdf_path: &Path, page_number: u32, dpi: u32) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
        let prefix = scratch.path().join("page");
        let page = page_number.to_string();

        let output = Command::new(&self.pdftoppm)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-singlefile")
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .with_context(|| {
                format!(
                    "failed to run {} (is poppler installed?)",
                    self.pdftoppm.display()
                )
            })?;

        if !output.status.success() {
            bail!(
                "pdftoppm failed on page {}: {}",
                page_number,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let png = prefix.with_extension("png");
        fs::read(&png).with_context(|| format!("pdftoppm produced no image at {}", png.display()))
    }
}
