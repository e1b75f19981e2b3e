pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod store;
pub mod types;
pub mod worker;

pub use extract::{ExtractError, PatternExtractor, IDENTIFIER_PREFIX};
pub use pipeline::{CompiledProfile, ExtractionPipeline, PipelineError};
pub use preprocess::{enhance, validate_upload, PreprocessError, UploadLimits, ValidatedImage};
pub use recognizer::{parse_hocr_words, MockRecognizer, OcrBackend, OcrError};
pub use store::UploadStore;
pub use types::{BoundingBox, DigitPattern, ExtractionProfile, ExtractionResult, RecognitionHit};
pub use worker::{LocalEngine, RecognitionWorker};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::{TesseractOptions, TesseractRecognizer};
