use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;

use leaf_backend::classifier::{Classifier, SharedClassifier};
use leaf_backend::config::Args;
use leaf_backend::handlers::{self, AppState};
use leaf_backend::inference::InferenceHandler;
use leaf_backend::logging;
use leaf_backend::onnx::OnnxClassifier;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);
    args.validate()?;

    let model_path = args.model.clone();
    let labels_path = args.labels.clone();
    let preprocessor = args.preprocessor();
    let classifier = Arc::new(SharedClassifier::new(move || {
        OnnxClassifier::load(&model_path, labels_path.as_deref(), preprocessor)
            .map(|c| Box::new(c) as Box<dyn Classifier>)
    }));
    classifier
        .get()
        .with_context(|| format!("loading model {}", args.model.display()))?;

    let handler = InferenceHandler::new(classifier).with_target_size(args.input_size);
    let state = web::Data::new(AppState::new(handler, args.max_upload_bytes));

    log::info!("Server running at http://{}:{}", args.host, args.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await?;

    Ok(())
}
