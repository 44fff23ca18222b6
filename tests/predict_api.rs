use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::Value;

use leaf_backend::classifier::{Classification, Classifier};
use leaf_backend::error::ClassifierError;
use leaf_backend::handlers::{self, AppState};
use leaf_backend::inference::InferenceHandler;
use leaf_backend::models::ModelInfo;

const BOUNDARY: &str = "leafboundary";

struct StubClassifier {
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl StubClassifier {
    fn new(fail_with: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            fail_with: fail_with.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Classifier for StubClassifier {
    fn classify(&self, path: &Path, _: u32) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists());
        if let Some(message) = &self.fail_with {
            return Err(ClassifierError::Other(message.clone()));
        }
        Ok(Classification {
            top1: 0,
            top1_conf: 0.92,
            top5: vec![0, 1],
            top5_conf: vec![0.92, 0.08],
            names: BTreeMap::from([
                (0, "Bacterial Blight".to_string()),
                (1, "Brown Spot".to_string()),
            ]),
        })
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "stub".to_string(),
            input_size: 224,
            labels: vec!["Bacterial Blight".to_string(), "Brown Spot".to_string()],
        }
    }
}

fn file_part(filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
        BOUNDARY, filename
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn text_part(name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n--{}--\r\n",
        BOUNDARY, name, value, BOUNDARY
    )
    .into_bytes()
}

fn predict_request(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/predict")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

fn state(classifier: Arc<StubClassifier>, max_upload_bytes: usize) -> web::Data<AppState> {
    let handler = InferenceHandler::new(classifier);
    web::Data::new(AppState::new(handler, max_upload_bytes))
}

#[actix_web::test]
async fn test_predict_returns_top1() {
    let classifier = StubClassifier::new(None);
    let app = test::init_service(
        App::new()
            .app_data(state(classifier.clone(), 1024))
            .configure(handlers::configure),
    )
    .await;

    let req = predict_request(file_part("leaf.jpg", b"jpegbytes")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["label"], "Bacterial Blight");
    assert_eq!(body["confidence_text"], "92.00%");
    assert_eq!(body["summary"], "Bacterial Blight (92.00%)");
    assert_eq!(body["top5"].as_array().unwrap().len(), 2);
    assert_eq!(body["top5"][1]["label"], "Brown Spot");
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_predict_without_file_is_empty() {
    let classifier = StubClassifier::new(None);
    let app = test::init_service(
        App::new()
            .app_data(state(classifier.clone(), 1024))
            .configure(handlers::configure),
    )
    .await;

    let req = predict_request(text_part("note", "hello")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_predict_rejects_unsupported_extension() {
    let classifier = StubClassifier::new(None);
    let app = test::init_service(
        App::new()
            .app_data(state(classifier.clone(), 1024))
            .configure(handlers::configure),
    )
    .await;

    let req = predict_request(file_part("leaf.gif", b"GIF89a")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("gif"));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_predict_reports_classifier_failure() {
    let classifier = StubClassifier::new(Some("model output malformed"));
    let app = test::init_service(
        App::new()
            .app_data(state(classifier, 1024))
            .configure(handlers::configure),
    )
    .await;

    let req = predict_request(file_part("leaf.png", b"pngbytes")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "An error occurred: model output malformed");
}

#[actix_web::test]
async fn test_predict_rejects_oversized_upload() {
    let classifier = StubClassifier::new(None);
    let app = test::init_service(
        App::new()
            .app_data(state(classifier.clone(), 8))
            .configure(handlers::configure),
    )
    .await;

    let req = predict_request(file_part("leaf.jpg", &[0u8; 64])).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_health_and_model_info() {
    let app = test::init_service(
        App::new()
            .app_data(state(StubClassifier::new(None), 1024))
            .configure(handlers::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/model").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], "stub");
    assert_eq!(body["input_size"], 224);
    assert_eq!(body["labels"][0], "Bacterial Blight");
}
