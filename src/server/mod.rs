//! The user-facing JSON web server. Every `POST` is an emotion request and
//! every `OPTIONS` is answered as a CORS preflight.

use crate::error::AnalysisError;
use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use tracing::error;

pub mod routes;

impl actix_web::error::ResponseError for AnalysisError {
    fn error_response(&self) -> HttpResponse {
        error!("error processing request: {self}");

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .body(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::MalformedRequest(_) | AnalysisError::ImageDecode => {
                StatusCode::BAD_REQUEST
            }
            AnalysisError::Detection(_) | AnalysisError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
