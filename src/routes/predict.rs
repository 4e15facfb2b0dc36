use crate::{classifier::ClassifierError, server::SharedState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Image as a `data:<mime>;base64,<payload>` string.
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub result: String,
    pub confidence: String,
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("image field is not a base64 data URL")]
    NotADataUrl,
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    ImageDecode(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

impl From<ClassifierError> for PredictError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::ImageDecode(msg) => PredictError::ImageDecode(msg),
            ClassifierError::Inference(msg) => PredictError::Inference(msg),
        }
    }
}

impl PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::NotADataUrl
            | PredictError::InvalidBase64(_)
            | PredictError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status_code(), format!("Something went wrong: {}", self)).into_response()
    }
}

/// Splits a data URL on its first comma and decodes the trailing payload.
fn decode_data_url(image: &str) -> Result<Vec<u8>, PredictError> {
    let (_, payload) = image.split_once(',').ok_or(PredictError::NotADataUrl)?;
    let image_data = BASE64_STANDARD.decode(payload)?;

    Ok(image_data)
}

#[instrument(skip(state, request))]
pub async fn predict(
    State(state): State<SharedState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, PredictError> {
    let image_data = decode_data_url(&request.image)?;

    let prediction = state.classifier.classify(&image_data)?;

    tracing::debug!(
        "Classified image as {} with {:.2}% confidence",
        prediction.verdict.as_str(),
        prediction.confidence
    );

    Ok(Json(PredictResponse {
        result: prediction.verdict.as_str().to_string(),
        confidence: format!("{:.2}%", prediction.confidence),
    }))
}
