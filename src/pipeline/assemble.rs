//! Combined-deck PDF assembly via pdfium.
//!
//! Every saved slide image is scaled to [`TARGET_RESOLUTION`] and placed on
//! its own page of exactly that size (1 px = 1 pt), so the PDF pages share
//! one 16:9 geometry regardless of what the backend returned.
//!
//! pdfium is a blocking C library; callers in async code run
//! [`DeckAssembler::assemble`] inside `spawn_blocking`.

use crate::error::SlidegenError;
use image::imageops::FilterType;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Width and height, in pixels, of every slide page.
pub const TARGET_RESOLUTION: (u32, u32) = (1920, 1080);

/// File name of the combined deck inside the output directory.
pub const COMBINED_PDF_NAME: &str = "slide_combined.pdf";

#[cfg(target_os = "macos")]
const PDFIUM_LIB_NAME: &str = "libpdfium.dylib";
#[cfg(target_os = "windows")]
const PDFIUM_LIB_NAME: &str = "pdfium.dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PDFIUM_LIB_NAME: &str = "libpdfium.so";

/// Builds a multi-page PDF from image files.
///
/// Returns the number of pages written.
pub trait DeckAssembler: Send + Sync {
    fn assemble(&self, images: &[PathBuf], output: &Path) -> Result<usize, SlidegenError>;
}

/// The default assembler, backed by a pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumAssembler;

impl DeckAssembler for PdfiumAssembler {
    fn assemble(&self, images: &[PathBuf], output: &Path) -> Result<usize, SlidegenError> {
        let slides = normalize_all(images);
        if slides.is_empty() {
            return Err(SlidegenError::NoUsableImages {
                path: output.to_path_buf(),
            });
        }

        let pdfium = bind_pdfium()?;
        let fail = |e: PdfiumError| SlidegenError::PdfAssemblyFailed {
            path: output.to_path_buf(),
            detail: format!("{e:?}"),
        };

        let (w, h) = TARGET_RESOLUTION;
        let (width, height) = (PdfPoints::new(w as f32), PdfPoints::new(h as f32));

        let mut document = pdfium.create_new_pdf().map_err(fail)?;
        for image in &slides {
            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::Custom(width, height))
                .map_err(fail)?;
            page.objects_mut()
                .create_image_object(
                    PdfPoints::ZERO,
                    PdfPoints::ZERO,
                    image,
                    Some(width),
                    Some(height),
                )
                .map_err(fail)?;
        }

        document.save_to_file(output).map_err(fail)?;
        info!("Wrote {} page(s) to {}", slides.len(), output.display());
        Ok(slides.len())
    }
}

/// Bind to pdfium.
///
/// `PDFIUM_LIB_PATH` may name the library file or the directory holding it.
/// Without it, a library next to the working directory is tried before the
/// system loader.
pub fn bind_pdfium() -> Result<Pdfium, SlidegenError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(raw) => {
            let mut path = PathBuf::from(raw);
            if path.is_dir() {
                path.push(PDFIUM_LIB_NAME);
            }
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path).map_err(|e| {
                SlidegenError::PdfiumBindingFailed(format!("{}: {e:?}", path.display()))
            })?
        }
        None => Pdfium::bind_to_library(&Path::new(".").join(PDFIUM_LIB_NAME))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| SlidegenError::PdfiumBindingFailed(format!("{e:?}")))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Load an image and scale it to [`TARGET_RESOLUTION`].
///
/// The format is sniffed from content, not the extension. Aspect ratio is
/// not preserved; slides are expected to be 16:9 already.
pub fn load_normalized(path: &Path) -> Result<DynamicImage, image::ImageError> {
    let (w, h) = TARGET_RESOLUTION;
    let bytes = std::fs::read(path).map_err(image::ImageError::IoError)?;
    let img = image::load_from_memory(&bytes)?;
    let img = if img.width() == w && img.height() == h {
        img
    } else {
        img.resize_exact(w, h, FilterType::Lanczos3)
    };
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Load every path in order, skipping missing or undecodable files.
pub fn normalize_all(paths: &[PathBuf]) -> Vec<DynamicImage> {
    paths
        .iter()
        .filter_map(|path| match load_normalized(path) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Skipping {} in PDF: {}", path.display(), e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(w, h, Rgba([200, 40, 40, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn images_are_scaled_to_target_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "small.png", 64, 36);
        let img = load_normalized(&path).unwrap();
        assert_eq!((img.width(), img.height()), TARGET_RESOLUTION);
        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn unreadable_images_are_skipped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = write_png(dir.path(), "a.png", 32, 18);
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not a png").unwrap();
        let missing = dir.path().join("missing.png");
        let good_b = write_png(dir.path(), "b.png", 16, 9);

        let loaded = normalize_all(&[good_a, broken, missing, good_b]);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn assembling_nothing_usable_fails_before_binding() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(COMBINED_PDF_NAME);
        let err = PdfiumAssembler
            .assemble(&[dir.path().join("missing.png")], &out)
            .unwrap_err();
        assert!(matches!(err, SlidegenError::NoUsableImages { .. }));
        assert!(!out.exists());
    }
}
