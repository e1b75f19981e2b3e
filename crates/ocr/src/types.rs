use serde::{Deserialize, Serialize};

/// Axis-aligned region of a recognized fragment, in source image pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// A single text fragment produced by the OCR engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionHit {
    pub region: BoundingBox,
    pub text: String,
    /// Engine confidence (0.0 = guessed, 1.0 = certain).
    pub confidence: f32,
}

impl RecognitionHit {
    pub fn new(region: BoundingBox, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Hit with no meaningful location, as produced by mock engines.
    pub fn unplaced(text: impl Into<String>, confidence: f32) -> Self {
        Self::new(BoundingBox::default(), text, confidence)
    }
}

/// A successfully extracted company identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    /// `pv`-prefixed identifier.
    pub identifier: String,
    pub confidence: f32,
}

/// How many digits an identifier must consist of.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum DigitPattern {
    Exact(usize),
    Range(usize, usize),
}

impl DigitPattern {
    /// Anchored regex source matching exactly this many ASCII or Unicode digits.
    pub fn regex_source(&self) -> String {
        match self {
            DigitPattern::Exact(n) => format!(r"^\d{{{n}}}$"),
            DigitPattern::Range(min, max) => format!(r"^\d{{{min},{max}}}$"),
        }
    }
}

impl std::fmt::Display for DigitPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigitPattern::Exact(n) => write!(f, "{n}"),
            DigitPattern::Range(min, max) => write!(f, "{min}-{max}"),
        }
    }
}

impl std::str::FromStr for DigitPattern {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| format!("Invalid digit count: '{s}'"))
        };
        let pattern = match s.split_once('-') {
            Some((min, max)) => {
                let (min, max) = (parse(min)?, parse(max)?);
                if min == max {
                    DigitPattern::Exact(min)
                } else {
                    DigitPattern::Range(min, max)
                }
            }
            None => DigitPattern::Exact(parse(s)?),
        };
        match pattern {
            DigitPattern::Exact(0) | DigitPattern::Range(0, _) => {
                Err(format!("Digit count must be at least 1: '{s}'"))
            }
            DigitPattern::Range(min, max) if min > max => {
                Err(format!("Digit range is inverted: '{s}'"))
            }
            p => Ok(p),
        }
    }
}

impl TryFrom<String> for DigitPattern {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DigitPattern> for String {
    fn from(p: DigitPattern) -> Self {
        p.to_string()
    }
}

/// One extraction endpoint: which digit contract to enforce and whether to
/// run the enhancement chain before recognition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionProfile {
    pub path: String,
    pub digits: DigitPattern,
    #[serde(default)]
    pub enhance: bool,
}

impl ExtractionProfile {
    pub fn new(path: impl Into<String>, digits: DigitPattern, enhance: bool) -> Self {
        Self { path: path.into(), digits, enhance }
    }

    /// `/extract`, `/extract8` and `/extract6`.
    pub fn defaults() -> Vec<ExtractionProfile> {
        vec![
            ExtractionProfile::new("/extract", DigitPattern::Exact(8), false),
            ExtractionProfile::new("/extract8", DigitPattern::Exact(8), false),
            ExtractionProfile::new("/extract6", DigitPattern::Exact(6), true),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn recognition_hit_clamps_confidence() {
        let h = RecognitionHit::unplaced("123", 1.5);
        assert_eq!(h.confidence, 1.0);
        let h = RecognitionHit::unplaced("123", -0.1);
        assert_eq!(h.confidence, 0.0);
    }

    #[test]
    fn digit_pattern_parses_exact_and_range() {
        assert_eq!(DigitPattern::from_str("8").unwrap(), DigitPattern::Exact(8));
        assert_eq!(DigitPattern::from_str("6-8").unwrap(), DigitPattern::Range(6, 8));
        assert_eq!(DigitPattern::from_str("6-6").unwrap(), DigitPattern::Exact(6));
    }

    #[test]
    fn digit_pattern_rejects_bad_input() {
        assert!(DigitPattern::from_str("0").is_err());
        assert!(DigitPattern::from_str("8-6").is_err());
        assert!(DigitPattern::from_str("eight").is_err());
        assert!(DigitPattern::from_str("").is_err());
    }

    #[test]
    fn digit_pattern_display() {
        assert_eq!(DigitPattern::Exact(6).to_string(), "6");
        assert_eq!(DigitPattern::Range(6, 8).to_string(), "6-8");
    }

    #[test]
    fn digit_pattern_regex_source() {
        assert_eq!(DigitPattern::Exact(8).regex_source(), r"^\d{8}$");
        assert_eq!(DigitPattern::Range(6, 8).regex_source(), r"^\d{6,8}$");
    }

    #[test]
    fn profile_deserializes_digits_from_string() {
        let p: ExtractionProfile =
            serde_json::from_str(r#"{"path": "/extract", "digits": "6-8"}"#).unwrap();
        assert_eq!(p.digits, DigitPattern::Range(6, 8));
        assert!(!p.enhance);

        let bad = serde_json::from_str::<ExtractionProfile>(r#"{"path": "/x", "digits": "0"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn default_profiles_cover_all_routes() {
        let profiles = ExtractionProfile::defaults();
        let paths: Vec<_> = profiles.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/extract", "/extract8", "/extract6"]);
        assert!(profiles[2].enhance);
        assert_eq!(profiles[2].digits, DigitPattern::Exact(6));
    }
}
