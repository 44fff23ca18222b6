//! ONNX-backed [`Classifier`] running on tract.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tract_onnx::prelude::*;

use crate::classifier::{Classification, Classifier};
use crate::error::ClassifierError;
use crate::models::ModelInfo;
use crate::preprocess::{self, Preprocessor};

type Plan = TypedRunnableModel<TypedModel>;

pub struct OnnxClassifier {
    name: String,
    plan: Plan,
    preprocessor: Preprocessor,
    labels: BTreeMap<usize, String>,
}

impl OnnxClassifier {
    pub fn load(
        model_path: &Path,
        labels_path: Option<&Path>,
        preprocessor: Preprocessor,
    ) -> Result<Self, ClassifierError> {
        let size = preprocessor.size as usize;
        let load_err = |e: TractError| ClassifierError::ModelLoad {
            path: model_path.to_path_buf(),
            message: e.to_string(),
        };

        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(load_err)?;

        let labels = match labels_path {
            Some(path) => load_labels(path)?,
            None => BTreeMap::new(),
        };
        log::info!(
            "Loaded ONNX model {} ({} labels, input {}x{})",
            model_path.display(),
            labels.len(),
            size,
            size
        );

        let name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        Ok(Self {
            name,
            plan,
            preprocessor,
            labels,
        })
    }

    fn run(&self, image_path: &Path) -> Result<Vec<f32>, ClassifierError> {
        let img = preprocess::open_image(image_path)?;
        let input = self.preprocessor.tensor(&img);
        let size = self.preprocessor.size as usize;
        let data = input
            .as_slice()
            .ok_or_else(|| ClassifierError::Inference("input tensor is not contiguous".into()))?;

        let tensor = Tensor::from_shape(&[1, 3, size, size], data)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = outputs.first().ok_or(ClassifierError::EmptyOutput)?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}

impl Classifier for OnnxClassifier {
    fn classify(
        &self,
        image_path: &Path,
        target_size: u32,
    ) -> Result<Classification, ClassifierError> {
        if target_size != self.preprocessor.size {
            return Err(ClassifierError::InputSizeMismatch {
                expected: self.preprocessor.size,
                actual: target_size,
            });
        }

        let mut scores = self.run(image_path)?;
        if !is_distribution(&scores) {
            softmax(&mut scores);
        }

        let names = if self.labels.is_empty() {
            (0..scores.len()).map(|i| (i, format!("class_{}", i))).collect()
        } else {
            self.labels.clone()
        };
        Classification::from_scores(&scores, names)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            input_size: self.preprocessor.size,
            labels: self.labels.values().cloned().collect(),
        }
    }
}

pub fn load_labels(path: &Path) -> Result<BTreeMap<usize, String>, ClassifierError> {
    let text = fs::read_to_string(path).map_err(|source| ClassifierError::Labels {
        path: PathBuf::from(path),
        source,
    })?;
    Ok(parse_labels(&text))
}

/// Accepts one label per line in class order, or `index: label` lines as
/// exported in ultralytics `names` metadata. Quotes and trailing commas are
/// stripped.
pub fn parse_labels(text: &str) -> BTreeMap<usize, String> {
    let mut labels = BTreeMap::new();
    let mut next = 0;
    for line in text.lines() {
        let line = line.trim().trim_matches(|c: char| c == '{' || c == '}').trim();
        if line.is_empty() {
            continue;
        }

        let (index, label) = match line.split_once(|c: char| c == ':' || c.is_whitespace()) {
            Some((head, rest)) if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) => {
                (head.parse().unwrap_or(next), rest)
            }
            _ => (next, line),
        };
        let label = label
            .trim()
            .trim_end_matches(',')
            .trim_matches(|c: char| c == '\'' || c == '"')
            .trim();
        if label.is_empty() {
            continue;
        }

        labels.insert(index, label.to_string());
        next = index + 1;
    }
    labels
}

fn is_distribution(scores: &[f32]) -> bool {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    in_range && (sum - 1.0).abs() < 1e-3
}

fn softmax(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for s in scores.iter_mut() {
            *s /= sum;
        }
    }
}
