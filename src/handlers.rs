use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use uuid::Uuid;

use crate::error::DetectorError;
use crate::model::AppState;
use crate::models::ClassifyResponse;
use crate::pipeline;

pub async fn classify(
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, DetectorError> {
    let request_id = Uuid::new_v4();

    let bytes = read_file_field(&mut payload).await?;
    log::info!("[{}] received upload of {} bytes", request_id, bytes.len());

    let result = pipeline::classify_bytes(&bytes, state.get_ref())?;
    let allow = pipeline::allow(&result);
    log::info!(
        "[{}] label={} confidence={:.4} allow={}",
        request_id,
        result.label,
        result.confidence,
        allow
    );

    Ok(HttpResponse::Ok().json(ClassifyResponse {
        label: result.label,
        confidence: result.confidence,
        allow,
        scores: result.scores,
    }))
}

// The endpoint takes exactly one file field; its bytes are collected in
// memory and any further fields are ignored.
async fn read_file_field(payload: &mut Multipart) -> Result<Vec<u8>, DetectorError> {
    let mut field = match payload.next().await {
        Some(item) => item.map_err(|e| DetectorError::Upload(e.to_string()))?,
        None => return Err(DetectorError::Upload("no file field in request".to_string())),
    };

    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| DetectorError::Upload(e.to_string()))?;
        bytes.extend_from_slice(&data);
    }
    Ok(bytes)
}
