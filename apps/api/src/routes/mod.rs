pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::tailoring::handlers as tailoring;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/request-otp", post(auth::handle_request_otp))
        .route("/api/v1/auth/verify-otp", post(auth::handle_verify_otp))
        .route("/api/v1/auth/me", get(auth::handle_me))
        .route("/api/v1/auth/logout", post(auth::handle_logout))
        // Resumes
        .route(
            "/api/v1/resumes",
            post(resumes::handle_upload)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(resumes::handle_list),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get)
                .put(resumes::handle_update)
                .delete(resumes::handle_delete),
        )
        .route(
            "/api/v1/resumes/:id/download",
            get(resumes::handle_download),
        )
        .route(
            "/api/v1/resumes/:id/tailor",
            post(tailoring::handle_tailor),
        )
        .route(
            "/api/v1/resumes/:id/analyze",
            post(tailoring::handle_analyze),
        )
        .route(
            "/api/v1/resumes/:id/suggestions",
            get(tailoring::handle_suggestions),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::service::tests::{harness, RecordingMailer};
    use crate::config::Config;
    use crate::errors::AppError;
    use crate::storage::MemoryBlobStore;
    use crate::tailoring::{MatchInsights, SkillsGap, Tailor, TailoredResume};

    /// Echoes a fixed tailoring result that quotes the inputs back.
    struct CannedTailor;

    #[async_trait]
    impl Tailor for CannedTailor {
        async fn tailor(
            &self,
            resume_text: &str,
            job_description: &str,
        ) -> Result<TailoredResume, AppError> {
            Ok(TailoredResume {
                rewritten_resume: format!("{resume_text}\n[for: {job_description}]"),
                skills_gap: SkillsGap {
                    matched: vec!["Rust".to_string()],
                    missing: vec!["Kubernetes".to_string()],
                    recommendations: vec!["Learn Kubernetes".to_string()],
                },
                cover_letter: "Dear hiring manager,".to_string(),
            })
        }

        async fn analyze(
            &self,
            _resume_text: &str,
            _job_description: &str,
        ) -> Result<MatchInsights, AppError> {
            Ok(MatchInsights {
                matched_skills: vec!["Rust".to_string()],
                missing_skills: vec!["Kubernetes".to_string()],
                suggestions: vec!["Lead with the Rust work".to_string()],
            })
        }

        async fn suggest(&self, resume_text: &str) -> Result<Vec<String>, AppError> {
            Ok(vec![format!("Add metrics to: {}", resume_text.lines().next().unwrap_or(""))])
        }
    }

    struct TestApp {
        router: Router,
        mailer: Arc<RecordingMailer>,
    }

    fn app() -> TestApp {
        let h = harness();
        let state = AppState {
            config: Config::for_tests(),
            auth: h.service,
            blobs: Arc::new(MemoryBlobStore::new()),
            tailor: Arc::new(CannedTailor),
        };
        TestApp {
            router: build_router(state),
            mailer: h.mailer,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        json_request("POST", uri, body, token)
    }

    fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    const BOUNDARY: &str = "resume-api-test-boundary";

    fn upload_request(token: &str, file_name: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/api/v1/resumes")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap()
    }

    /// Runs request-otp and verify-otp for `email` and returns the verify response body.
    async fn login(app: &TestApp, email: &str) -> Value {
        let response = send(
            &app.router,
            post_json("/api/v1/auth/request-otp", json!({ "email": email }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let issued = json_body(response).await;
        assert_eq!(issued["expires_in"], 600);
        assert!(issued.get("code").is_none());

        let response = send(
            &app.router,
            post_json(
                "/api/v1/auth/verify-otp",
                json!({ "handle": issued["handle"], "code": app.mailer.last_code() }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    fn token_of(verified: &Value) -> String {
        verified["session_credential"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let response = send(
            &app.router,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_login_me_logout() {
        let app = app();
        let verified = login(&app, "Jane@Example.com").await;
        assert_eq!(verified["token_type"], "Bearer");
        assert_eq!(verified["expires_in"], 7 * 24 * 60 * 60);
        assert_eq!(verified["identity"]["email"], "jane@example.com");
        let token = token_of(&verified);

        let response = send(&app.router, authed("GET", "/api/v1/auth/me", &token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let me = json_body(response).await;
        assert_eq!(me["id"], verified["identity"]["id"]);
        assert_eq!(me["email"], "jane@example.com");

        let response = send(&app.router, authed("POST", "/api/v1/auth/logout", &token)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app.router, authed("GET", "/api/v1/auth/me", &token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_otp_failures_share_one_response() {
        let app = app();
        let response = send(
            &app.router,
            post_json("/api/v1/auth/request-otp", json!({ "email": "a@b.com" }), None),
        )
        .await;
        let issued = json_body(response).await;
        let code = app.mailer.last_code();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let mismatch = send(
            &app.router,
            post_json(
                "/api/v1/auth/verify-otp",
                json!({ "handle": issued["handle"], "code": wrong }),
                None,
            ),
        )
        .await;
        let unknown = send(
            &app.router,
            post_json(
                "/api/v1/auth/verify-otp",
                json!({ "handle": uuid::Uuid::new_v4(), "code": code }),
                None,
            ),
        )
        .await;

        assert_eq!(mismatch.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(mismatch).await, json_body(unknown).await);
    }

    #[tokio::test]
    async fn test_invalid_email_is_bad_request() {
        let app = app();
        let response = send(
            &app.router,
            post_json("/api/v1/auth/request-otp", json!({ "email": "nope" }), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_or_bad_credential_is_unauthorized() {
        let app = app();
        let response = send(
            &app.router,
            Request::get("/api/v1/resumes").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let response = send(&app.router, authed("GET", "/api/v1/resumes", "garbage")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_resume_lifecycle_and_tailoring() {
        let app = app();
        let token = token_of(&login(&app, "jane@example.com").await);

        let response = send(
            &app.router,
            upload_request(&token, "Jane CV.txt", b"Jane Doe\nRust engineer"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let uploaded = json_body(response).await;
        let id = uploaded["id"].as_str().unwrap().to_string();
        assert_eq!(uploaded["file_name"], "Jane CV.txt");
        assert_eq!(uploaded["extracted_text"], "Jane Doe\nRust engineer");

        let response = send(&app.router, authed("GET", "/api/v1/resumes", &token)).await;
        let listed = json_body(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], id.as_str());
        assert_eq!(listed[0]["uploaded_at"], uploaded["uploaded_at"]);

        let response = send(
            &app.router,
            authed("GET", &format!("/api/v1/resumes/{id}"), &token),
        )
        .await;
        assert_eq!(json_body(response).await["uploaded_at"], uploaded["uploaded_at"]);

        let response = send(
            &app.router,
            authed("GET", &format!("/api/v1/resumes/{id}/download"), &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Jane Doe\nRust engineer");

        let response = send(
            &app.router,
            post_json(
                &format!("/api/v1/resumes/{id}/tailor"),
                json!({ "job_description": "Senior Rust Engineer" }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let tailored = json_body(response).await;
        assert!(tailored["rewritten_resume"]
            .as_str()
            .unwrap()
            .contains("Senior Rust Engineer"));
        assert_eq!(tailored["skills_gap"]["missing"][0], "Kubernetes");

        let response = send(
            &app.router,
            authed("DELETE", &format!("/api/v1/resumes/{id}"), &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(
            &app.router,
            authed("GET", &format!("/api/v1/resumes/{id}"), &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resumes_are_isolated_per_identity() {
        let app = app();
        let owner = token_of(&login(&app, "owner@example.com").await);
        let intruder = token_of(&login(&app, "intruder@example.com").await);

        let response = send(&app.router, upload_request(&owner, "cv.md", b"# Owner")).await;
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(&app.router, authed("GET", "/api/v1/resumes", &intruder)).await;
        assert!(json_body(response).await.as_array().unwrap().is_empty());

        for (method, uri) in [
            ("GET", format!("/api/v1/resumes/{id}")),
            ("GET", format!("/api/v1/resumes/{id}/download")),
            ("GET", format!("/api/v1/resumes/{id}/suggestions")),
            ("DELETE", format!("/api/v1/resumes/{id}")),
        ] {
            let response = send(&app.router, authed(method, &uri, &intruder)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        }

        let response = send(
            &app.router,
            json_request(
                "PUT",
                &format!("/api/v1/resumes/{id}"),
                json!({ "file_name": "mine.md" }),
                Some(&intruder),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app.router,
            post_json(
                &format!("/api/v1/resumes/{id}/analyze"),
                json!({ "job_description": "Rust" }),
                Some(&intruder),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app.router,
            authed("GET", &format!("/api/v1/resumes/{id}"), &owner),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let app = app();
        let token = token_of(&login(&app, "jane@example.com").await);

        let response = send(&app.router, upload_request(&token, "cv.exe", b"MZ")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app.router, upload_request(&token, "cv.txt", b"")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app.router,
            post_json(
                &format!("/api/v1/resumes/{}/tailor", uuid::Uuid::new_v4()),
                json!({ "job_description": "   " }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_renames_and_edits_text() {
        let app = app();
        let token = token_of(&login(&app, "jane@example.com").await);
        let response = send(&app.router, upload_request(&token, "cv.txt", b"Jane Doe")).await;
        let uploaded = json_body(response).await;
        let id = uploaded["id"].as_str().unwrap().to_string();

        let response = send(
            &app.router,
            json_request(
                "PUT",
                &format!("/api/v1/resumes/{id}"),
                json!({ "file_name": "Jane Doe 2026.txt", "extracted_text": "Jane Doe\nStaff engineer" }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = json_body(response).await;
        assert_eq!(updated["file_name"], "Jane Doe 2026.txt");
        assert_eq!(updated["extracted_text"], "Jane Doe\nStaff engineer");
        assert_eq!(updated["uploaded_at"], uploaded["uploaded_at"]);
        assert!(updated["updated_at"].is_string());

        let response = send(
            &app.router,
            authed("GET", &format!("/api/v1/resumes/{id}/download"), &token),
        )
        .await;
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"Jane Doe 2026.txt\""
        );

        let response = send(
            &app.router,
            json_request(
                "PUT",
                &format!("/api/v1/resumes/{id}"),
                json!({ "file_name": "cv.pdf" }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_and_suggestions() {
        let app = app();
        let token = token_of(&login(&app, "jane@example.com").await);
        let response = send(
            &app.router,
            upload_request(&token, "cv.txt", b"Jane Doe\nRust engineer shipping Tokio services"),
        )
        .await;
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(
            &app.router,
            post_json(
                &format!("/api/v1/resumes/{id}/analyze"),
                json!({ "job_description": "Rust Tokio Kubernetes" }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let analysis = json_body(response).await;
        assert_eq!(analysis["resume_id"], id.as_str());
        assert_eq!(analysis["match_score"], 67);
        assert_eq!(analysis["keyword_density"]["kubernetes"], 0.0);
        assert_eq!(analysis["missing_skills"][0], "Kubernetes");
        assert_eq!(analysis["suggestions"][0], "Lead with the Rust work");

        let response = send(
            &app.router,
            post_json(
                &format!("/api/v1/resumes/{id}/analyze"),
                json!({ "job_description": "" }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app.router,
            authed("GET", &format!("/api/v1/resumes/{id}/suggestions"), &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let suggestions = json_body(response).await;
        assert_eq!(suggestions["suggestions"][0], "Add metrics to: Jane Doe");
        assert!(suggestions["generated_at"].is_string());
    }
}
