//! Builds the process-wide OCR engine from configuration.

use pvscan_ocr::{MockRecognizer, OcrBackend, OcrError, RecognitionHit};
use std::sync::Arc;

use crate::config::{EngineConfig, EngineKind};

/// Construct and warm up the configured engine. Called once at startup.
pub fn build(config: &EngineConfig) -> Result<Arc<dyn OcrBackend>, OcrError> {
    match config.kind {
        EngineKind::Mock => {
            let hits = config
                .mock_hits
                .iter()
                .map(|h| RecognitionHit::unplaced(h.text.clone(), h.confidence))
                .collect();
            tracing::warn!("using mock OCR engine; results are canned");
            Ok(Arc::new(MockRecognizer::new(hits)))
        }
        EngineKind::Tesseract => build_tesseract(config),
    }
}

#[cfg(feature = "tesseract")]
fn build_tesseract(config: &EngineConfig) -> Result<Arc<dyn OcrBackend>, OcrError> {
    use pvscan_ocr::{TesseractOptions, TesseractRecognizer};

    // Loads the model on its worker thread now, so requests never pay for it.
    let recognizer = TesseractRecognizer::start(TesseractOptions {
        data_path: config.data_path.clone(),
        lang: config.language.clone(),
        char_whitelist: config.char_whitelist.clone(),
    })?;
    tracing::info!(language = %config.language, "tesseract engine ready");
    Ok(Arc::new(recognizer))
}

#[cfg(not(feature = "tesseract"))]
fn build_tesseract(_config: &EngineConfig) -> Result<Arc<dyn OcrBackend>, OcrError> {
    Err(OcrError::NotAvailable)
}
