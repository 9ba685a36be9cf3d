//! Result materialisation: report, persist successes, assemble the deck.

use crate::batch::SlotKey;
use crate::error::SlidegenError;
use crate::output::{BatchReport, GenerationOutcome, GenerationSummary};
use crate::pipeline::assemble::{DeckAssembler, COMBINED_PDF_NAME};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Write image bytes to `path`, creating parent directories and
/// overwriting any existing file.
pub async fn save_image(bytes: &[u8], path: &Path) -> Result<(), SlidegenError> {
    let write_failed = |source| SlidegenError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }
    tokio::fs::write(path, bytes).await.map_err(write_failed)?;
    debug!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Report a settled batch, save its successes and build the combined PDF.
///
/// Failures are only reported. When at least one image was saved the deck
/// is assembled at `<output_dir>/slide_combined.pdf`; an assembly error is
/// logged and recorded in [`GenerationSummary::pdf_error`] without
/// discarding the saved images. Write errors are fatal.
pub async fn materialize(
    paired: Vec<(SlotKey, GenerationOutcome)>,
    output_dir: &Path,
    assembler: Arc<dyn DeckAssembler>,
) -> Result<GenerationSummary, SlidegenError> {
    let report = BatchReport::from_outcomes(paired.iter().map(|(_, outcome)| outcome));
    for line in report.lines() {
        if report.failed == 0 {
            info!("{line}");
        } else {
            warn!("{line}");
        }
    }

    let mut saved: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
    let mut saved_in_order = Vec::new();
    for (key, outcome) in &paired {
        let slot = saved.entry(key.slide_index).or_default();
        if let GenerationOutcome::Success(bytes) = outcome {
            let path = output_dir.join(format!("{}.png", key.file_stem()));
            save_image(bytes, &path).await?;
            slot.push(path.clone());
            saved_in_order.push(path);
        }
    }

    let mut summary = GenerationSummary {
        report,
        output_dir: output_dir.to_path_buf(),
        saved,
        ..Default::default()
    };

    if saved_in_order.is_empty() {
        warn!("No images saved; skipping {COMBINED_PDF_NAME}");
        return Ok(summary);
    }

    info!(
        "Saved {} image(s) to {}",
        saved_in_order.len(),
        output_dir.display()
    );
    let pdf_path = output_dir.join(COMBINED_PDF_NAME);
    let target = pdf_path.clone();
    let assembled =
        tokio::task::spawn_blocking(move || assembler.assemble(&saved_in_order, &target))
            .await
            .map_err(|e| SlidegenError::Internal(format!("PDF assembly task panicked: {e}")))?;

    match assembled {
        Ok(pages) => {
            info!("Created {} ({} page(s))", COMBINED_PDF_NAME, pages);
            summary.pdf = Some(pdf_path);
        }
        Err(e) => {
            warn!("Could not create {}: {}", COMBINED_PDF_NAME, e);
            summary.pdf_error = Some(e.to_string());
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
        fail: bool,
    }

    impl DeckAssembler for Recording {
        fn assemble(&self, images: &[PathBuf], output: &Path) -> Result<usize, SlidegenError> {
            self.calls
                .lock()
                .unwrap()
                .push((images.to_vec(), output.to_path_buf()));
            if self.fail {
                return Err(SlidegenError::PdfiumBindingFailed("not installed".into()));
            }
            Ok(images.len())
        }
    }

    fn failure() -> GenerationOutcome {
        GenerationOutcome::Failure(RequestError::Exhausted {
            attempts: 3,
            last: Box::new(RequestError::Shape("No images in response".into())),
        })
    }

    #[tokio::test]
    async fn save_image_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/slide_p01_v01.png");
        save_image(b"first", &path).await.unwrap();
        save_image(b"second", &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn successes_are_saved_and_failures_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Arc::new(Recording::default());
        let paired = vec![
            (SlotKey::new(1, 1), GenerationOutcome::Success(b"a".to_vec())),
            (SlotKey::new(1, 2), failure()),
            (SlotKey::new(3, 1), GenerationOutcome::Success(b"b".to_vec())),
            (SlotKey::new(3, 2), GenerationOutcome::Success(b"c".to_vec())),
        ];

        let summary = materialize(paired, dir.path(), assembler.clone()).await.unwrap();

        assert_eq!(summary.report.succeeded, 3);
        assert_eq!(summary.report.failed, 1);
        assert_eq!(summary.saved_count(), 3);
        assert_eq!(summary.saved[&1], vec![dir.path().join("slide_p01_v01.png")]);
        assert_eq!(
            summary.saved[&3],
            vec![
                dir.path().join("slide_p03_v01.png"),
                dir.path().join("slide_p03_v02.png"),
            ]
        );
        assert!(!dir.path().join("slide_p01_v02.png").exists());
        assert_eq!(std::fs::read(dir.path().join("slide_p03_v02.png")).unwrap(), b"c");

        let calls = assembler.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, summary.saved_paths());
        assert_eq!(calls[0].1, dir.path().join("slide_combined.pdf"));
        assert_eq!(summary.pdf, Some(dir.path().join("slide_combined.pdf")));
    }

    #[tokio::test]
    async fn nothing_saved_means_no_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Arc::new(Recording::default());
        let paired = vec![(SlotKey::new(2, 1), failure()), (SlotKey::new(2, 2), failure())];

        let summary = materialize(paired, dir.path(), assembler.clone()).await.unwrap();

        assert_eq!(summary.saved_count(), 0);
        assert_eq!(summary.saved.get(&2), Some(&Vec::new()));
        assert!(summary.pdf.is_none());
        assert!(summary.pdf_error.is_none());
        assert!(assembler.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn assembly_errors_keep_saved_images() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let paired = vec![(SlotKey::new(1, 1), GenerationOutcome::Success(b"a".to_vec()))];

        let summary = materialize(paired, dir.path(), assembler).await.unwrap();

        assert!(summary.pdf.is_none());
        assert!(summary.pdf_error.unwrap().contains("not installed"));
        assert!(dir.path().join("slide_p01_v01.png").exists());
    }
}
