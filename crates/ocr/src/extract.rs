use regex::Regex;
use thiserror::Error;

use crate::types::{DigitPattern, ExtractionResult, RecognitionHit};

/// Prefix attached to every extracted company identifier.
pub const IDENTIFIER_PREFIX: &str = "pv";

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("No {0}-digit number found.")]
    PatternNotFound(DigitPattern),
}

/// Finds the first recognized fragment that is entirely a company identifier.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    pattern: DigitPattern,
    re: Regex,
}

impl PatternExtractor {
    pub fn new(pattern: DigitPattern) -> Self {
        // DigitPattern only ever renders a well-formed anchored quantifier.
        let re = Regex::new(&pattern.regex_source()).expect("invalid regex");
        Self { pattern, re }
    }

    /// Scan hits in engine order and return the first full match, prefixed.
    pub fn extract(&self, hits: &[RecognitionHit]) -> Result<ExtractionResult, ExtractError> {
        hits.iter()
            .find(|h| self.re.is_match(&h.text))
            .map(|h| ExtractionResult {
                identifier: format!("{IDENTIFIER_PREFIX}{}", h.text),
                confidence: h.confidence,
            })
            .ok_or(ExtractError::PatternNotFound(self.pattern))
    }
}
