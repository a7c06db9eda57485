use axum::{
    http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    http::{HeaderName, Method, Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::{canvas, handlers, quizzes};
use crate::core::{config::Settings, state::AppState};

pub(crate) fn router(state: AppState) -> Router {
    let cors = build_cors_layer(state.settings());
    let api_v1_prefix = state.settings().api().api_v1_str.clone();
    let api_v1 = Router::new()
        .nest("/courses", quizzes::router())
        .nest("/canvas", canvas::router());

    let request_id_header = HeaderName::from_static("x-request-id");
    let request_id_header_for_span = request_id_header.clone();
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(move |request: &Request<_>| {
            let request_id = request
                .headers()
                .get(&request_id_header_for_span)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_response(|response: &Response<axum::body::Body>, latency: Duration, _span: &Span| {
            let status_label = response.status().as_u16().to_string();
            metrics::counter!(
                "http_requests_total",
                "status" => status_label.clone()
            )
            .increment(1);
            metrics::histogram!(
                "http_request_duration_seconds",
                "status" => status_label
            )
            .record(latency.as_secs_f64());
        });

    let mut router: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest(&api_v1_prefix, api_v1)
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(trace_layer)
        .layer(cors);

    if state.settings().telemetry().prometheus_enabled {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router.with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins = settings
        .cors()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        // Wildcard origin cannot be combined with allow_credentials
        base.allow_origin(Any)
    } else {
        base.allow_credentials(true)
            .allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::router;
    use crate::core::{config::Settings, metrics};
    use crate::test_support::{self, bearer_token, json_request, read_json, setup_test_context};

    const GRADE_URI: &str = "/api/v1/courses/1/quizzes/2/submissions/3/grade";

    #[tokio::test]
    async fn root_returns_message() {
        let ctx = setup_test_context().await;

        let response = ctx.app.oneshot(json_request(Method::GET, "/", None, None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["message"], "Canvas Grader API");
        assert_eq!(body["api_prefix"], "/api/v1");
    }

    #[tokio::test]
    async fn answers_require_bearer_token() {
        let ctx = setup_test_context().await;

        let response = ctx
            .app
            .oneshot(json_request(
                Method::GET,
                "/api/v1/courses/1/quizzes/2/submissions/3/answers",
                None,
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("www-authenticate").and_then(|v| v.to_str().ok()), Some("Bearer"));
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let ctx = setup_test_context().await;

        let response = ctx
            .app
            .oneshot(json_request(Method::POST, GRADE_URI, Some("not-a-jwt"), Some(json!({"score": 1.0}))))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn negative_score_is_rejected_before_canvas() {
        let ctx = setup_test_context().await;
        let token = bearer_token("instructor-1", ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(
                Method::POST,
                GRADE_URI,
                Some(&token),
                Some(json!({"question_id": "9", "score": -2.0})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn malformed_path_ids_are_rejected() {
        let ctx = setup_test_context().await;
        let token = bearer_token("instructor-1", ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(
                Method::DELETE,
                "/api/v1/courses/1%2F2/quizzes/2/submissions/3/answers",
                Some(&token),
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cache_invalidation_without_redis_reports_nothing_removed() {
        let ctx = setup_test_context().await;
        let token = bearer_token("instructor-1", ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(
                Method::DELETE,
                "/api/v1/courses/1/quizzes/2/submissions/3/answers",
                Some(&token),
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["invalidated"], json!(false));
    }

    #[tokio::test]
    async fn unusable_canvas_url_is_rejected_before_storage() {
        let ctx = setup_test_context().await;
        let token = bearer_token("instructor-1", ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(
                Method::PUT,
                "/api/v1/canvas/credentials",
                Some(&token),
                Some(json!({"canvas_url": "http://exa mple.com", "canvas_token": "abc"})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_disabled_returns_404() {
        let ctx = setup_test_context().await;

        let response =
            ctx.app.oneshot(json_request(Method::GET, "/metrics", None, None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_enabled_returns_200() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("PROMETHEUS_ENABLED", "1");

        let settings = Settings::load().expect("settings");
        std::env::set_var("PROMETHEUS_ENABLED", "0");
        metrics::init(&settings).expect("metrics init");
        let app = router(test_support::build_state(settings));

        let response =
            app.oneshot(json_request(Method::GET, "/metrics", None, None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
