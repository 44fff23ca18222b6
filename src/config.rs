use std::path::PathBuf;

use clap::Parser;

use crate::classifier::DEFAULT_INPUT_SIZE;
use crate::preprocess::{Normalization, Preprocessor, ResizeMode};

#[derive(Parser, Debug, Clone)]
#[command(name = "leaf-backend", about = "Rice leaf disease classification backend")]
pub struct Args {
    /// Host address to bind the server
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Path to the ONNX classification model
    #[arg(long, default_value = "model.onnx")]
    pub model: PathBuf,

    /// Labels file, one class per line or `index: label`
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Square input size the model was exported with
    #[arg(long, default_value_t = DEFAULT_INPUT_SIZE)]
    pub input_size: u32,

    /// How uploads are fitted to the model input
    #[arg(long, value_enum, default_value_t = ResizeMode::CenterCrop)]
    pub resize_mode: ResizeMode,

    /// Pixel normalization applied before inference
    #[arg(long, value_enum, default_value_t = Normalization::Unit)]
    pub normalization: Normalization,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Default log level, RUST_LOG takes precedence
    #[arg(long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.input_size == 0 {
            anyhow::bail!("--input-size must be greater than zero");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("--max-upload-bytes must be greater than zero");
        }
        Ok(())
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.input_size, self.resize_mode, self.normalization)
    }
}
