use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse, Result};
use futures_util::StreamExt;

use crate::error::ErrorKind;
use crate::inference::{InferenceHandler, ViewState};
use crate::models::{ErrorResponse, ImageKind, PredictionResponse, UploadedImage};

pub struct AppState {
    pub handler: InferenceHandler,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(handler: InferenceHandler, max_upload_bytes: usize) -> Self {
        Self {
            handler,
            max_upload_bytes,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/model").route(web::get().to(model_info)));
}

pub async fn predict(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let (filename, bytes) = match read_upload(&mut payload, state.max_upload_bytes).await? {
        Some(file) => file,
        None => return Ok(render(state.handler.handle(None))),
    };

    let kind = match ImageKind::from_filename(&filename) {
        Ok(kind) => kind,
        Err(e) => {
            log::warn!("Rejected upload {}: {}", filename, e);
            return Ok(render(ViewState::Failed(e)));
        }
    };

    let upload = UploadedImage::new(bytes, kind);
    let handler = state.handler.clone();
    let view = web::block(move || handler.handle(Some(&upload))).await?;
    Ok(render(view))
}

/// Reads the first multipart field that carries a filename.
async fn read_upload(
    payload: &mut Multipart,
    limit: usize,
) -> Result<Option<(String, Vec<u8>)>, Error> {
    while let Some(item) = payload.next().await {
        let mut field = item?;
        let filename = match field.content_disposition().get_filename() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if bytes.len() + data.len() > limit {
                log::warn!("Upload {} exceeds {} bytes", filename, limit);
                return Err(actix_web::error::ErrorPayloadTooLarge(
                    "Upload exceeds size limit",
                ));
            }
            bytes.extend_from_slice(&data);
        }
        return Ok(Some((filename, bytes)));
    }
    Ok(None)
}

fn render(view: ViewState) -> HttpResponse {
    match view {
        ViewState::AwaitingUpload => HttpResponse::NoContent().finish(),
        ViewState::Ready(result) => HttpResponse::Ok().json(PredictionResponse::from(result)),
        ViewState::Failed(e) => {
            let body = ErrorResponse {
                error: e.user_message(),
            };
            match e.kind() {
                ErrorKind::Input => HttpResponse::BadRequest().json(body),
                ErrorKind::Io | ErrorKind::Classifier => {
                    log::error!("Prediction failed: {}", e);
                    HttpResponse::InternalServerError().json(body)
                }
            }
        }
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.handler.classifier().info())
}
