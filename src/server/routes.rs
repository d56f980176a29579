//! HTTP routes. Emotion requests are accepted on any path, matching clients
//! that post to whatever URL the adapter is mounted at.

use crate::config::Settings;
use crate::error::AnalysisError;
use crate::protocol::HealthResponse;
use crate::service::EmotionService;
use actix_web::http::header;
use actix_web::{get, options, post, web, HttpResponse, Responder};
use anyhow::anyhow;

type Result<T> = std::result::Result<T, AnalysisError>;

/// Register every route on an `App`, along with the request body limit
pub fn configure(settings: &Settings) -> impl FnOnce(&mut web::ServiceConfig) {
    let max_body_bytes = settings.max_body_bytes;
    move |cfg| {
        cfg.app_data(web::PayloadConfig::new(max_body_bytes))
            .service(health)
            .service(preflight)
            .service(emotion);
    }
}

/// Liveness probe
#[get("/health")]
pub async fn health(state: web::Data<EmotionService>) -> impl Responder {
    web::Json(HealthResponse {
        status: "ok",
        detector: state.detector_name().to_string(),
    })
}

/// CORS preflight for any path
#[options("/{tail:.*}")]
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .finish()
}

/// Run emotion recognition on a base64 data-URL image
#[post("/{tail:.*}")]
pub async fn emotion(body: web::Bytes, state: web::Data<EmotionService>) -> Result<HttpResponse> {
    // Decoding and inference are CPU bound, keep them off the worker's event loop
    let service = state.into_inner();
    let response = web::block(move || service.analyze(&body))
        .await
        .map_err(|e| AnalysisError::Internal(anyhow!("request handler failed: {e}")))??;

    Ok(HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::EmotionDistribution;
    use crate::util::test::{self as helpers, StubDetector};
    use actix_web::http::{Method, StatusCode};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn state(detector: StubDetector) -> web::Data<EmotionService> {
        web::Data::new(EmotionService::new(Arc::new(detector)))
    }

    #[actix_web::test]
    async fn test_post_returns_predictions() {
        let dist = EmotionDistribution::from([0.02, 0.0, 0.05, 0.9, 0.01, 0.01, 0.01]);
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![dist])))
                .configure(configure(&Settings::default())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/emotion")
            .set_payload(helpers::request_body(10, 10))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["emotion"], "happy");
        let predictions = body["predictions"].as_object().unwrap();
        assert_eq!(predictions.len(), 7);
        for label in ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"] {
            let score = predictions[label].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&score), "{label} = {score}");
        }
    }

    #[actix_web::test]
    async fn test_post_without_face() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&Settings::default())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload(helpers::request_body(4, 4))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["emotion"], "neutral");
        assert!(body["predictions"]
            .as_object()
            .unwrap()
            .values()
            .all(|v| v.as_f64() == Some(0.0)));
    }

    #[actix_web::test]
    async fn test_bad_image_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&Settings::default())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload(r#"{"data":{"image":"data:image/png;base64,AAAA"}}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert_eq!(body, "Failed to decode image");
    }

    #[actix_web::test]
    async fn test_malformed_json_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&Settings::default())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload("this is not json")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("invalid JSON body"));
    }

    #[actix_web::test]
    async fn test_detector_failure_is_500() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::failing("out of memory")))
                .configure(configure(&Settings::default())),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload(helpers::request_body(4, 4))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_preflight_any_path() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&Settings::default())),
        )
        .await;

        for path in ["/", "/api/emotion", "/a/b/c"] {
            let req = test::TestRequest::default()
                .method(Method::OPTIONS)
                .uri(path)
                .to_request();
            let resp = test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::OK, "{path}");
            let headers = resp.headers();
            assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
            assert_eq!(
                headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
                "GET, POST, OPTIONS"
            );
            assert_eq!(
                headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
                "Content-Type"
            );
            assert!(test::read_body(resp).await.is_empty());
        }
    }

    #[actix_web::test]
    async fn test_large_body_accepted() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&Settings::default())),
        )
        .await;

        // Bigger than actix's 256 KiB default payload limit
        let body = helpers::padded_request_body(8, 8, 300 * 1024);
        assert!(body.len() > 256 * 1024);
        let req = test::TestRequest::post().uri("/").set_payload(body).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_body_over_limit_is_rejected() {
        let settings = Settings {
            max_body_bytes: 1024,
            ..Settings::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&settings)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_payload(helpers::padded_request_body(8, 8, 4096))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(state(StubDetector::with_faces(vec![])))
                .configure(configure(&Settings::default())),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["detector"], "stub");
    }
}
