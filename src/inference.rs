//! Upload-to-prediction flow.
//!
//! The upload is staged to a scoped temporary file, handed to the classifier
//! by path, and the file is removed before [`InferenceHandler::predict`]
//! returns, whatever the classifier did.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::{Builder, NamedTempFile};
use uuid::Uuid;

use crate::classifier::{Classification, Classifier, DEFAULT_INPUT_SIZE};
use crate::error::ProcessingError;
use crate::models::{Prediction, PredictionResult, UploadedImage};

/// What the page shows after an interaction.
#[derive(Debug)]
pub enum ViewState {
    AwaitingUpload,
    Ready(PredictionResult),
    Failed(ProcessingError),
}

#[derive(Clone)]
pub struct InferenceHandler {
    classifier: Arc<dyn Classifier>,
    target_size: u32,
    staging_dir: Option<PathBuf>,
}

impl InferenceHandler {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            target_size: DEFAULT_INPUT_SIZE,
            staging_dir: None,
        }
    }

    pub fn with_target_size(mut self, target_size: u32) -> Self {
        self.target_size = target_size;
        self
    }

    /// Stage uploads under `dir` instead of the system temp directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    pub fn handle(&self, upload: Option<&UploadedImage>) -> ViewState {
        match upload {
            None => ViewState::AwaitingUpload,
            Some(upload) => match self.predict(upload) {
                Ok(result) => ViewState::Ready(result),
                Err(e) => ViewState::Failed(e),
            },
        }
    }

    pub fn predict(&self, upload: &UploadedImage) -> Result<PredictionResult, ProcessingError> {
        let staged = self.stage(upload)?;
        log::debug!(
            "Staged {} byte upload at {}",
            upload.bytes.len(),
            staged.path().display()
        );

        let outcome = self.classifier.classify(staged.path(), self.target_size);
        if let Err(e) = staged.close() {
            log::warn!("Failed to remove staged upload: {}", e);
        }

        let result = to_result(outcome?)?;
        log::info!("Prediction: {}", result.summary());
        Ok(result)
    }

    fn stage(&self, upload: &UploadedImage) -> io::Result<NamedTempFile> {
        let prefix = format!("upload-{}-", Uuid::new_v4());
        let suffix = format!(".{}", upload.kind.extension());
        let mut builder = Builder::new();
        builder.prefix(&prefix).suffix(&suffix);
        let mut file = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(&upload.bytes)?;
        file.flush()?;
        Ok(file)
    }
}

fn to_result(classification: Classification) -> Result<PredictionResult, ProcessingError> {
    let conf = classification.top1_conf;
    if !conf.is_finite() || !(0.0..=1.0).contains(&conf) {
        return Err(ProcessingError::InvalidConfidence(conf));
    }
    let label = classification
        .label(classification.top1)
        .filter(|l| !l.is_empty())
        .ok_or(ProcessingError::UnknownClass(classification.top1))?;

    let top1 = Prediction {
        label: label.to_string(),
        confidence: conf * 100.0,
    };

    // ranked entries the model has no usable label or score for are dropped
    let top5 = classification
        .top5
        .iter()
        .zip(&classification.top5_conf)
        .filter(|(_, c)| c.is_finite() && (0.0..=1.0).contains(*c))
        .filter_map(|(&i, &c)| {
            classification
                .label(i)
                .filter(|l| !l.is_empty())
                .map(|l| Prediction {
                    label: l.to_string(),
                    confidence: c * 100.0,
                })
        })
        .collect();

    Ok(PredictionResult { top1, top5 })
}
