//! The seam between the request handler and whatever model answers it.
//!
//! A [`Classifier`] maps an image on disk to a [`Classification`]. The
//! production implementation is [`crate::onnx::OnnxClassifier`]; tests plug
//! in fixed fakes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;

use crate::error::ClassifierError;
use crate::models::ModelInfo;

/// Input edge length, in pixels, the model is fed.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Number of ranked entries kept beside the top-1 prediction.
pub const TOP_K: usize = 5;

pub trait Classifier: Send + Sync {
    fn classify(&self, image_path: &Path, target_size: u32)
        -> Result<Classification, ClassifierError>;

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "classifier".to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            labels: Vec::new(),
        }
    }
}

/// Raw classifier output. Confidences are on the 0-1 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub top1: usize,
    pub top1_conf: f32,
    pub top5: Vec<usize>,
    pub top5_conf: Vec<f32>,
    pub names: BTreeMap<usize, String>,
}

impl Classification {
    /// Ranks `scores` (one per class, already probabilities) and keeps the
    /// best [`TOP_K`].
    pub fn from_scores(
        scores: &[f32],
        names: BTreeMap<usize, String>,
    ) -> Result<Self, ClassifierError> {
        if scores.is_empty() {
            return Err(ClassifierError::EmptyOutput);
        }

        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        // NaN sorts last
        let key = |i: usize| {
            let s = scores[i];
            if s.is_nan() {
                f32::NEG_INFINITY
            } else {
                s
            }
        };
        ranked.sort_by(|&a, &b| key(b).total_cmp(&key(a)).then(a.cmp(&b)));
        ranked.truncate(TOP_K);

        let top5_conf = ranked.iter().map(|&i| scores[i]).collect::<Vec<_>>();
        Ok(Self {
            top1: ranked[0],
            top1_conf: top5_conf[0],
            top5: ranked,
            top5_conf,
            names,
        })
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }
}

type Loader = Box<dyn Fn() -> Result<Box<dyn Classifier>, ClassifierError> + Send + Sync>;

/// Process-wide, read-only classifier built on first use.
///
/// Callers arriving while the first load runs block on it and share its
/// result. A failed load leaves the cell empty, so the next caller tries
/// again.
pub struct SharedClassifier {
    loader: Loader,
    instance: OnceCell<Box<dyn Classifier>>,
    loads: AtomicUsize,
}

impl SharedClassifier {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Classifier>, ClassifierError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            instance: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> Result<&dyn Classifier, ClassifierError> {
        let classifier = self.instance.get_or_try_init(|| {
            let loaded = (self.loader)()?;
            self.loads.fetch_add(1, Ordering::Relaxed);
            log::info!("Classifier loaded");
            Ok::<_, ClassifierError>(loaded)
        })?;
        Ok(classifier.as_ref())
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.instance.get().is_some()
    }

    #[cfg(test)]
    fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl Classifier for SharedClassifier {
    fn classify(
        &self,
        image_path: &Path,
        target_size: u32,
    ) -> Result<Classification, ClassifierError> {
        self.get()?.classify(image_path, target_size)
    }

    fn info(&self) -> ModelInfo {
        match self.get() {
            Ok(classifier) => classifier.info(),
            Err(e) => {
                log::warn!("Model info requested but classifier failed to load: {}", e);
                ModelInfo {
                    name: "unavailable".to_string(),
                    input_size: DEFAULT_INPUT_SIZE,
                    labels: Vec::new(),
                }
            }
        }
    }
}
