use crate::error::{RagError, RagResult};
use crate::models::Page;
use crate::pdf_backend::PdfBackend;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MANIFEST_FILE: &str = "metadata.json";
const IMAGE_DIR: &str = "images";
const TEXT_DIR: &str = "texts";
const STAGING_DIR: &str = ".staging";

/// Turns a PDF into one image file and one text file per page, plus a
/// JSON manifest listing them.
///
/// Pages are written into a staging directory first. The previous run's
/// artifacts and manifest are only replaced once every page succeeded.
pub struct PageExtractor {
    backend: Arc<dyn PdfBackend>,
    output_dir: PathBuf,
    dpi: u32,
    parallel: bool,
}

impl PageExtractor {
    pub fn new(backend: Arc<dyn PdfBackend>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            output_dir: output_dir.into(),
            dpi: 150,
            parallel: false,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Render pages on the rayon pool. Page order in the result is unchanged.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.output_dir.join(IMAGE_DIR)
    }

    pub fn text_dir(&self) -> PathBuf {
        self.output_dir.join(TEXT_DIR)
    }

    fn staging_dir(&self) -> PathBuf {
        self.output_dir.join(STAGING_DIR)
    }

    pub fn extract(&self, pdf_path: &Path) -> RagResult<Vec<Page>> {
        if !pdf_path.is_file() {
            return Err(RagError::source_not_found(pdf_path, "no such file"));
        }

        log::info!("Starting PDF processing for: {}", pdf_path.display());

        let texts = self.backend.page_texts(pdf_path).map_err(|e| {
            RagError::source_not_found(pdf_path, format!("cannot be opened: {e:#}"))
        })?;
        let total = texts.len();
        log::info!("PDF has {} pages.", total);

        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(staging.join(IMAGE_DIR))?;
        fs::create_dir_all(staging.join(TEXT_DIR))?;

        let pages = match self.write_pages(pdf_path, &texts) {
            Ok(pages) => pages,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    log::warn!("Could not remove {}: {}", staging.display(), cleanup);
                }
                return Err(e);
            }
        };

        self.promote_staging()?;
        self.write_manifest(&pages)?;
        log::info!("Successfully processed {} pages.", pages.len());
        Ok(pages)
    }

    fn write_pages(&self, pdf_path: &Path, texts: &[String]) -> RagResult<Vec<Page>> {
        let total = texts.len();
        if self.parallel {
            texts
                .par_iter()
                .enumerate()
                .map(|(index, text)| self.write_page(pdf_path, index, text, total))
                .collect()
        } else {
            texts
                .iter()
                .enumerate()
                .map(|(index, text)| self.write_page(pdf_path, index, text, total))
                .collect()
        }
    }

    /// Renders into the staging directory but records the final paths.
    fn write_page(&self, pdf_path: &Path, index: usize, text: &str, total: usize) -> RagResult<Page> {
        let page_number = u32::try_from(index + 1)
            .map_err(|_| RagError::Extraction(format!("page index {index} out of range")))?;

        let png = self
            .backend
            .render_png(pdf_path, page_number, self.dpi)
            .map_err(|e| RagError::Extraction(format!("page {page_number}: {e:#}")))?;

        let image_name = format!("page_{page_number}.png");
        let text_name = format!("page_{page_number}.txt");
        let staging = self.staging_dir();
        fs::write(staging.join(IMAGE_DIR).join(&image_name), png)?;
        fs::write(staging.join(TEXT_DIR).join(&text_name), text)?;

        if page_number % 20 == 0 {
            log::info!("Processed page {}/{}", page_number, total);
        }

        Ok(Page {
            page_number,
            image_path: self.image_dir().join(image_name).to_string_lossy().into_owned(),
            text_path: self.text_dir().join(text_name).to_string_lossy().into_owned(),
        })
    }

    /// Swaps the staged page directories in for the previous run's.
    fn promote_staging(&self) -> RagResult<()> {
        let staging = self.staging_dir();
        for (name, target) in [(IMAGE_DIR, self.image_dir()), (TEXT_DIR, self.text_dir())] {
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            fs::rename(staging.join(name), &target)?;
        }
        fs::remove_dir_all(&staging)?;
        Ok(())
    }

    /// Replaces the manifest in one step so readers never see a partial file.
    fn write_manifest(&self, pages: &[Page]) -> RagResult<()> {
        let json = serde_json::to_string_pretty(pages)
            .map_err(|e| RagError::Extraction(format!("failed to encode manifest: {e}")))?;

        let path = self.manifest_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Reads back a manifest written by a previous extraction.
    pub fn load_manifest(path: &Path) -> RagResult<Vec<Page>> {
        let raw = fs::read_to_string(path)
            .map_err(|e| RagError::source_not_found(path, format!("manifest unreadable: {e}")))?;
        let mut pages: Vec<Page> = serde_json::from_str(&raw)
            .map_err(|e| RagError::Extraction(format!("invalid manifest {}: {e}", path.display())))?;
        pages.sort_by_key(|page| page.page_number);
        Ok(pages)
    }
}
