use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::auth::extractors::require_auth;
use crate::state::AppState;
use crate::{appointments, auth, dashboard, patients};

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth::protected_router())
        .merge(patients::router())
        .merge(appointments::router())
        .merge(dashboard::router())
        .route_layer(middleware::from_fn_with_state(
            state.keys.clone(),
            require_auth,
        ));

    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .route("/health", get(|| async { "ok" }))
                .merge(protected),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        request_id = %Uuid::new_v4(),
                        status = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use time::{Duration, OffsetDateTime};

    /// Spawns the app on an ephemeral port and returns its `/api/v1` base URL.
    async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_app(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/v1")
    }

    async fn error_of(res: reqwest::Response) -> String {
        let body: Value = res.json().await.unwrap();
        body["error"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let base = spawn(AppState::fake()).await;
        let res = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let base = spawn(AppState::fake()).await;
        let client = reqwest::Client::new();

        for path in ["/me", "/patients", "/appointments", "/dashboard/stats"] {
            let res = client.get(format!("{base}{path}")).send().await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
            assert_eq!(error_of(res).await, "missing Authorization header", "{path}");
        }

        for header in ["Token abc", "Bearer", "Bearer a b"] {
            let res = client
                .get(format!("{base}/patients"))
                .header("Authorization", header)
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{header}");
            assert_eq!(error_of(res).await, "invalid Authorization header", "{header}");
        }
    }

    #[tokio::test]
    async fn doctor_cannot_delete_patients_or_appointments() {
        let state = AppState::fake();
        let token = state.keys.issue(4, Role::Doctor).unwrap();
        let base = spawn(state).await;
        let client = reqwest::Client::new();

        for path in ["/patients/7", "/appointments/7"] {
            let res = client
                .delete(format!("{base}{path}"))
                .bearer_auth(&token)
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
            assert_eq!(error_of(res).await, "access denied");
        }
    }

    #[tokio::test]
    async fn update_with_field_outside_allow_list_is_a_400() {
        let state = AppState::fake();
        let token = state.keys.issue(2, Role::Receptionist).unwrap();
        let base = spawn(state).await;
        let client = reqwest::Client::new();

        let cases = [
            ("/patients/7", json!({ "password_hash": "x" }), "unknown field `password_hash`"),
            ("/patients/7", json!({}), "no fields to update"),
            ("/patients/7", json!({ "first_name": "  " }), "field `first_name` must not be blank"),
            ("/appointments/7", json!({ "created_by": 1 }), "unknown field `created_by`"),
            ("/appointments/7", json!({ "appointment_date": "" }), "no fields to update"),
        ];
        for (path, body, message) in cases {
            let res = client
                .put(format!("{base}{path}"))
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path} {body}");
            assert_eq!(error_of(res).await, message, "{path} {body}");
        }
    }

    #[tokio::test]
    async fn update_with_mistyped_value_is_a_400() {
        let state = AppState::fake();
        let token = state.keys.issue(2, Role::Receptionist).unwrap();
        let base = spawn(state).await;

        let res = reqwest::Client::new()
            .put(format!("{base}/appointments/7"))
            .bearer_auth(&token)
            .json(&json!({ "doctor_id": "four" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res).await, "field `doctor_id` expects an integer");
    }

    #[tokio::test]
    async fn bad_token_on_gated_route_is_401_not_403() {
        let base = spawn(AppState::fake()).await;
        let res = reqwest::Client::new()
            .delete(format!("{base}/patients/7"))
            .bearer_auth("not.a.token")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(res).await, "invalid token");
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let state = AppState::fake();
        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = state.keys.issue_at(4, Role::Receptionist, issued).unwrap();
        let base = spawn(state).await;

        let res = reqwest::Client::new()
            .get(format!("{base}/me"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(res).await, "token expired");
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let base = spawn(AppState::fake()).await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{base}/auth/register"))
            .json(&json!({
                "email": "Front.Desk@Clinic.test",
                "password": "hunter22",
                "role": "receptionist",
                "first_name": "Rae",
                "last_name": "Lind"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["user"]["role"], "receptionist");
        assert!(body["user"].get("password_hash").is_none());

        let res = client
            .post(format!("{base}/auth/login"))
            .json(&json!({ "email": "front.desk@clinic.test", "password": "hunter22" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        let token = body["token"].as_str().unwrap().to_string();

        let res = client
            .get(format!("{base}/me"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let me: Value = res.json().await.unwrap();
        assert_eq!(me["email"], "front.desk@clinic.test");
        assert_eq!(me["first_name"], "Rae");
    }

    #[tokio::test]
    async fn duplicate_register_conflicts_and_bad_login_is_uniform() {
        let base = spawn(AppState::fake()).await;
        let client = reqwest::Client::new();
        let payload = json!({
            "email": "doc@clinic.test",
            "password": "secret1",
            "role": "doctor",
            "first_name": "Ada",
            "last_name": "Moss"
        });

        let first = client
            .post(format!("{base}/auth/register"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = client
            .post(format!("{base}/auth/register"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let wrong_password = client
            .post(format!("{base}/auth/login"))
            .json(&json!({ "email": "doc@clinic.test", "password": "nope-nope" }))
            .send()
            .await
            .unwrap();
        let unknown_user = client
            .post(format!("{base}/auth/login"))
            .json(&json!({ "email": "ghost@clinic.test", "password": "nope-nope" }))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(wrong_password).await, error_of(unknown_user).await);
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let base = spawn(AppState::fake()).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/auth/register"))
            .json(&json!({
                "email": "x@clinic.test",
                "password": "123",
                "role": "doctor",
                "first_name": "X",
                "last_name": "Y"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
