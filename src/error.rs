use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use derive_more::Display;
use serde_json::json;
use std::collections::BTreeMap;

/// Failure reported to the caller as `{"message": ...}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "Validation failed")]
    Validation(BTreeMap<&'static str, String>),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Logs the underlying cause and hides it from the response.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{context}");
        ApiError::Internal
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => json!({ "message": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

// Extractor failures (bad JSON, query or path) answer in the same
// `{"message"}` shape as handler errors.

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::{App, test as atest};
    use serde::Deserialize;

    #[actix_web::test]
    async fn validation_errors_are_listed_per_field() {
        let mut errors = BTreeMap::new();
        errors.insert("nis", "NIS must be at least 8 characters".to_string());
        let resp = ApiError::Validation(errors).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["errors"]["nis"], "NIS must be at least 8 characters");
    }

    #[test]
    fn internal_hides_the_cause() {
        let err = ApiError::internal("Failed to fetch", "connection refused");
        assert_eq!(err.to_string(), "Internal Server Error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[derive(Deserialize)]
    struct Page {
        #[allow(dead_code)]
        page: u32,
    }

    async fn message_of(resp: actix_web::dev::ServiceResponse) -> String {
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("content-type").unwrap().to_str().unwrap(),
            "application/json"
        );
        let body: serde_json::Value = atest::read_body_json(resp).await;
        body["message"].as_str().unwrap().to_string()
    }

    #[actix_web::test]
    async fn malformed_query_and_path_answer_in_json() {
        let app = atest::init_service(
            App::new()
                .app_data(query_config())
                .app_data(path_config())
                .route(
                    "/items",
                    web::get().to(|_: web::Query<Page>| async { HttpResponse::Ok() }),
                )
                .route(
                    "/items/{id}",
                    web::get().to(|_: web::Path<u64>| async { HttpResponse::Ok() }),
                ),
        )
        .await;

        for uri in ["/items?page=first", "/items/abc"] {
            let req = atest::TestRequest::get().uri(uri).to_request();
            let resp = atest::call_service(&app, req).await;
            assert!(!message_of(resp).await.is_empty(), "{uri}");
        }
    }

    #[actix_web::test]
    async fn malformed_json_answers_in_json() {
        let app = atest::init_service(App::new().app_data(json_config()).route(
            "/items",
            web::post().to(|_: web::Json<serde_json::Value>| async { HttpResponse::Ok() }),
        ))
        .await;

        let req = atest::TestRequest::post()
            .uri("/items")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"name\": ")
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert!(!message_of(resp).await.is_empty());
    }
}
