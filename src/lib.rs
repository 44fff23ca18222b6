pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod logging;
pub mod models;
pub mod onnx;
pub mod preprocess;
