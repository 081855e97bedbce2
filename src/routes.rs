use crate::{
    api::{attendance, checkin, dashboard, recap, student},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_config, path_config, query_config},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let sign_in_limiter = Arc::new(build_limiter(config.rate_sign_in_per_min));
    let sign_up_limiter = Arc::new(build_limiter(config.rate_sign_up_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let reset_limiter = Arc::new(build_limiter(config.rate_reset_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config());

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/sign-up")
                    .wrap(sign_up_limiter)
                    .route(web::post().to(handlers::sign_up)),
            )
            .service(
                web::resource("/sign-in")
                    .wrap(sign_in_limiter.clone())
                    .route(web::post().to(handlers::sign_in)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh)),
            )
            .service(
                web::resource("/sign-out")
                    .wrap(sign_in_limiter)
                    .route(web::post().to(handlers::sign_out)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(reset_limiter.clone())
                    .route(web::post().to(handlers::reset_password)),
            )
            .service(
                web::resource("/update-password")
                    .wrap(reset_limiter)
                    .route(web::post().to(handlers::update_password)),
            ),
    );

    cfg.service(
        web::resource("/photos/attendance-photos/{file}").route(web::get().to(checkin::serve_photo)),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/session").route(web::get().to(handlers::session)))
            .service(
                web::scope("/students")
                    // /students
                    .service(
                        web::resource("")
                            .route(web::get().to(student::list_students))
                            .route(web::post().to(student::create_student)),
                    )
                    // before /{id}
                    .service(web::resource("/summary").route(web::get().to(student::student_summary)))
                    .service(web::resource("/export").route(web::get().to(student::export_students)))
                    // /students/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(student::get_student))
                            .route(web::put().to(student::update_student))
                            .route(web::delete().to(student::delete_student)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(web::resource("/dashboard").route(web::get().to(dashboard::get_dashboard)))
            .service(
                web::scope("/recap")
                    .service(web::resource("").route(web::get().to(recap::get_recap)))
                    .service(web::resource("/export").route(web::get().to(recap::export_recap))),
            )
            .service(
                web::scope("/me/attendance")
                    // /me/attendance?month=
                    .service(web::resource("").route(web::get().to(checkin::my_history)))
                    .service(web::resource("/today").route(web::get().to(checkin::today_check_in)))
                    .service(web::resource("/stats").route(web::get().to(checkin::my_stats)))
                    .service(
                        web::resource("/camera").route(web::post().to(checkin::camera_check_in)),
                    )
                    .service(
                        web::resource("/excuse").route(web::post().to(checkin::excuse_check_in)),
                    ),
            ),
    );
}

// SIGN IN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, old refresh token revoked

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use actix_web::{App, http::StatusCode, test as atest, web::Data};
    use sqlx::mysql::MySqlPoolOptions;

    #[actix_web::test]
    async fn protected_scope_requires_a_bearer_token() {
        let config = test_config();
        let app = atest::init_service(
            App::new()
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config)),
        )
        .await;

        for uri in ["/api/students", "/api/dashboard", "/api/me/attendance/today"] {
            let req = atest::TestRequest::get()
                .uri(uri)
                .peer_addr("127.0.0.1:40000".parse().unwrap())
                .to_request();
            let resp = atest::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[actix_web::test]
    async fn malformed_sign_in_body_gets_a_json_message() {
        let config = test_config();
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let app = atest::init_service(
            App::new()
                .app_data(Data::new(config.clone()))
                .app_data(Data::new(pool))
                .configure(|cfg| configure(cfg, &config)),
        )
        .await;

        let req = atest::TestRequest::post()
            .uri("/auth/sign-in")
            .peer_addr("127.0.0.1:40001".parse().unwrap())
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"email\": ")
            .to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = atest::read_body_json(resp).await;
        assert!(body["message"].is_string());
    }

    #[test]
    fn zero_rate_still_builds_a_limiter() {
        let _ = build_limiter(0);
        let _ = build_limiter(100_000);
    }
}
