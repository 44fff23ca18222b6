use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::ProcessingError;

/// Image formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpg,
    Png,
}

impl ImageKind {
    pub fn from_extension(ext: &str) -> Result<Self, ProcessingError> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageKind::Jpg),
            "png" => Ok(ImageKind::Png),
            other => Err(ProcessingError::UnsupportedExtension(other.to_string())),
        }
    }

    pub fn from_filename(filename: &str) -> Result<Self, ProcessingError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// Raw upload owned by a single request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, kind: ImageKind) -> Self {
        Self { bytes, kind }
    }
}

/// A label with its confidence as a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2}%)", self.label, self.confidence)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub top1: Prediction,
    /// Highest confidence first, at most five entries.
    pub top5: Vec<Prediction>,
}

impl PredictionResult {
    pub fn label(&self) -> &str {
        &self.top1.label
    }

    pub fn confidence_text(&self) -> String {
        self.top1.confidence_text()
    }

    pub fn summary(&self) -> String {
        self.top1.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub label: String,
    pub confidence: f32,
    pub confidence_text: String,
    pub summary: String,
    pub top5: Vec<Prediction>,
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            confidence_text: result.confidence_text(),
            summary: result.summary(),
            label: result.top1.label,
            confidence: result.top1.confidence,
            top5: result.top5,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub input_size: u32,
    pub labels: Vec<String>,
}
