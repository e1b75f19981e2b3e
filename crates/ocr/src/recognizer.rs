use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::types::{BoundingBox, RecognitionHit};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return recognized
/// fragments in the order the engine reports them.
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set list of hits — useful for exercising extraction and the
/// HTTP layer without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub hits: Vec<RecognitionHit>,
}

impl MockRecognizer {
    pub fn new(hits: Vec<RecognitionHit>) -> Self {
        Self { hits }
    }

    /// Convenience constructor from `(text, confidence)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f32)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(text, conf)| RecognitionHit::unplaced(text, conf))
                .collect(),
        )
    }
}

impl OcrBackend for MockRecognizer {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError> {
        Ok(self.hits.clone())
    }
}

// ── hOCR parsing ──────────────────────────────────────────────────────────────

fn re_hocr_word() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(
            r#"(?s)<span\s+class=['"]ocrx_word['"][^>]*?title=['"]bbox (\d+) (\d+) (\d+) (\d+);[^'"]*?x_wconf (\d+)[^'"]*['"][^>]*>(.*?)</span>"#,
        )
        .expect("invalid regex")
    })
}

fn re_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"<[^>]*>").expect("invalid regex"))
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse word-level hits out of Tesseract hOCR output.
///
/// Each `ocrx_word` span yields one hit: the `bbox` corners become the region
/// and `x_wconf` (0–100) is scaled to 0.0–1.0. Words that are empty after
/// stripping markup are skipped.
pub fn parse_hocr_words(hocr: &str) -> Vec<RecognitionHit> {
    re_hocr_word()
        .captures_iter(hocr)
        .filter_map(|c| {
            let coord = |i: usize| c[i].parse::<u32>().ok();
            let (x0, y0, x1, y1) = (coord(1)?, coord(2)?, coord(3)?, coord(4)?);
            let conf = c[5].parse::<f32>().ok()? / 100.0;
            let text = decode_entities(&re_tag().replace_all(&c[6], ""));
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            let region = BoundingBox {
                left: x0,
                top: y0,
                width: x1.saturating_sub(x0),
                height: y1.saturating_sub(y0),
            };
            Some(RecognitionHit::new(region, text, conf))
        })
        .collect()
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{parse_hocr_words, OcrBackend, OcrError};
    use crate::types::RecognitionHit;
    use crate::worker::{LocalEngine, RecognitionWorker};
    use leptess::{LepTess, Variable};

    /// How to load the Tesseract model.
    #[derive(Debug, Clone)]
    pub struct TesseractOptions {
        pub data_path: Option<String>,
        pub lang: String,
        pub char_whitelist: Option<String>,
    }

    struct LepTessEngine(LepTess);

    impl LocalEngine for LepTessEngine {
        fn recognize(&mut self, image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError> {
            self.0
                .set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let hocr = self
                .0
                .get_hocr_text(0)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(parse_hocr_words(&hocr))
        }
    }

    fn load(options: &TesseractOptions) -> Result<LepTessEngine, OcrError> {
        let mut lt = LepTess::new(options.data_path.as_deref(), &options.lang)
            .map_err(|e| OcrError::Engine(e.to_string()))?;
        if let Some(chars) = &options.char_whitelist {
            lt.set_variable(Variable::TesseditCharWhitelist, chars)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
        }
        Ok(LepTessEngine(lt))
    }

    /// One Tesseract instance, loaded at startup and owned by a worker thread.
    pub struct TesseractRecognizer {
        worker: RecognitionWorker,
    }

    impl TesseractRecognizer {
        /// Load the model on a dedicated thread; fails if the data path or
        /// language is unusable.
        pub fn start(options: TesseractOptions) -> Result<Self, OcrError> {
            tracing::debug!(lang = %options.lang, "loading tesseract model");
            let worker = RecognitionWorker::spawn("tesseract", move || load(&options))?;
            Ok(Self { worker })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn name(&self) -> &'static str {
            "tesseract"
        }

        fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<RecognitionHit>, OcrError> {
            self.worker.recognize(image_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_hits() {
        let r = MockRecognizer::from_pairs([("ACME LTD", 0.8), ("12345678", 0.93)]);
        let hits = r.recognize(b"fake image data").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].text, "12345678");
        assert_eq!(hits[1].confidence, 0.93);
    }

    #[test]
    fn mock_ignores_image_content() {
        let r = MockRecognizer::from_pairs([("hello", 0.5)]);
        assert_eq!(r.recognize(b"anything").unwrap(), r.recognize(b"").unwrap());
    }

    #[test]
    fn parse_hocr_extracts_words_in_order() {
        let hocr = "<div class='ocr_page'>\
            <span class='ocr_line' id='line_1_1' title='bbox 10 20 300 60'>\
            <span class='ocrx_word' id='word_1_1' title='bbox 10 20 110 60; x_wconf 91'>Company</span> \
            <span class='ocrx_word' id='word_1_2' title='bbox 120 20 300 60; x_wconf 87'>12345678</span>\
            </span></div>";
        let hits = parse_hocr_words(hocr);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Company");
        assert_eq!(hits[1].text, "12345678");
        assert!((hits[1].confidence - 0.87).abs() < 1e-6);
        assert_eq!(
            hits[1].region,
            BoundingBox { left: 120, top: 20, width: 180, height: 40 }
        );
    }

    #[test]
    fn parse_hocr_strips_markup_and_entities() {
        let hocr = r#"<span class="ocrx_word" id="word_1_1" title="bbox 0 0 5 5; x_wconf 50"><strong>A&amp;B</strong></span>"#;
        let hits = parse_hocr_words(hocr);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "A&B");
    }

    #[test]
    fn parse_hocr_skips_blank_words() {
        let hocr = "<span class='ocrx_word' id='w' title='bbox 0 0 5 5; x_wconf 95'> </span>";
        assert!(parse_hocr_words(hocr).is_empty());
        assert!(parse_hocr_words("").is_empty());
    }
}
