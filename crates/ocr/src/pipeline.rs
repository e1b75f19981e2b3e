use std::sync::Arc;
use thiserror::Error;

use crate::extract::{ExtractError, PatternExtractor};
use crate::preprocess::{self, PreprocessError, UploadLimits};
use crate::recognizer::{OcrBackend, OcrError};
use crate::store::UploadStore;
use crate::types::{ExtractionProfile, ExtractionResult};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl PipelineError {
    /// Whether the failure was caused by the upload itself rather than by the
    /// engine or the host.
    pub fn is_rejection(&self) -> bool {
        match self {
            PipelineError::Preprocess(PreprocessError::Encode(_)) => false,
            PipelineError::Preprocess(_) | PipelineError::Extract(_) => true,
            PipelineError::Io(_) | PipelineError::Ocr(_) => false,
        }
    }
}

/// A profile with its digit regex compiled once.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub profile: ExtractionProfile,
    extractor: PatternExtractor,
}

impl From<ExtractionProfile> for CompiledProfile {
    fn from(profile: ExtractionProfile) -> Self {
        let extractor = PatternExtractor::new(profile.digits);
        Self { profile, extractor }
    }
}

/// Orchestrates: validate → store → enhance → OCR → extract.
///
/// The engine is created once by the caller and shared by every request.
#[derive(Clone)]
pub struct ExtractionPipeline {
    engine: Arc<dyn OcrBackend>,
    limits: UploadLimits,
    store: Option<UploadStore>,
}

impl ExtractionPipeline {
    pub fn new(engine: Arc<dyn OcrBackend>, limits: UploadLimits) -> Self {
        Self { engine, limits, store: None }
    }

    pub fn with_store(mut self, store: UploadStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Run one upload through the profile. Blocking; call from a blocking
    /// context when inside an async runtime.
    pub fn process_bytes(
        &self,
        data: &[u8],
        profile: &CompiledProfile,
    ) -> Result<ExtractionResult, PipelineError> {
        // 1. Size and dimension checks, downscaling if needed.
        let validated = preprocess::validate_upload(data, &self.limits)?;

        // 2. Keep the original upload when a store is configured.
        if let Some(store) = &self.store {
            let path = store.put(data, Some(validated.source_format))?;
            tracing::debug!(path = %path.display(), "stored upload");
        }

        // 3. Optional enhancement chain.
        let image_bytes = if profile.profile.enhance {
            preprocess::enhance(&validated)?
        } else {
            validated.bytes
        };

        // 4. Run OCR.
        let hits = self.engine.recognize(&image_bytes)?;
        tracing::debug!(hits = hits.len(), engine = self.engine.name(), "recognition done");

        // 5. First fragment matching the digit contract.
        Ok(profile.extractor.extract(&hits)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
