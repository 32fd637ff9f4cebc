//! End-to-end tests for the API client against an in-process HTTP server.
//!
//! Uses recording Notifier/Navigator implementations to observe side effects.

#[cfg(test)]
mod client_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::Query;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    use crate::api::error::{NETWORK_MESSAGE, TIMEOUT_MESSAGE};
    use crate::api::{ApiClient, ApiError, RequestOptions, ResultCode};
    use crate::config::ClientConfig;
    use crate::hooks::{Navigator, Notifier};
    use crate::state::{SessionStore, UserInfo};

    // ── Recording collaborators ──────────────────────────────────────────

    #[derive(Default)]
    struct RecordingNotifier {
        errors: Mutex<Vec<String>>,
        shown: AtomicU32,
        hidden: AtomicU32,
    }

    impl RecordingNotifier {
        fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn error(&self, msg: &str) {
            self.errors.lock().unwrap().push(msg.to_string());
        }

        fn show_loading(&self) {
            self.shown.fetch_add(1, Ordering::SeqCst);
        }

        fn hide_loading(&self) {
            self.hidden.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn routes(&self) -> Vec<String> {
            self.routes.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn replace(&self, path: &str) {
            self.routes.lock().unwrap().push(path.to_string());
        }
    }

    // ── Test server ──────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    async fn echo_token(headers: HeaderMap) -> Json<Value> {
        let token = headers
            .get("x-access-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<missing>");
        Json(json!({ "code": 200, "msg": "ok", "data": token }))
    }

    async fn get_user(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        let id: u32 = query.get("id").and_then(|v| v.parse().ok()).unwrap_or(0);
        Json(json!({ "code": 200, "msg": "", "data": { "id": id, "name": "ada" } }))
    }

    async fn put_user(Json(user): Json<User>) -> Json<Value> {
        Json(json!({ "code": 200, "msg": "updated", "data": user }))
    }

    async fn delete_user(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!({ "code": "200", "msg": "deleted", "data": query.get("id") }))
    }

    async fn expired() -> Json<Value> {
        Json(json!({ "code": 401, "msg": "Login has expired", "data": null }))
    }

    async fn failed(Json(_body): Json<Value>) -> Json<Value> {
        Json(json!({ "code": 500, "msg": "Insufficient balance", "data": null }))
    }

    async fn forbidden() -> (StatusCode, &'static str) {
        (StatusCode::FORBIDDEN, "nope")
    }

    async fn slow() -> Json<Value> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Json(json!({ "code": 200, "msg": "", "data": "slow" }))
    }

    async fn no_data() -> Json<Value> {
        Json(json!({ "code": 200, "msg": "deleted" }))
    }

    async fn echo_trace(headers: HeaderMap) -> Json<Value> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "code": 200,
            "msg": "",
            "data": { "trace": header("x-trace-id"), "token": header("x-access-token") }
        }))
    }

    async fn echo_form(headers: HeaderMap, body: String) -> Json<Value> {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<missing>");
        Json(json!({
            "code": 200,
            "msg": "",
            "data": { "contentType": content_type, "body": body }
        }))
    }

    async fn download() -> Vec<u8> {
        vec![0xDE, 0xAD, 0xBE, 0xEF]
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/token", get(echo_token))
            .route("/user", get(get_user).put(put_user).delete(delete_user))
            .route("/expired", get(expired))
            .route("/failed", post(failed))
            .route("/forbidden", get(forbidden))
            .route("/slow", get(slow))
            .route("/no-data", get(no_data))
            .route("/trace", get(echo_trace))
            .route("/form", post(echo_form))
            .route("/download", post(download));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    struct Harness {
        client: ApiClient,
        session: Arc<SessionStore>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(config: ClientConfig) -> Harness {
        let session = Arc::new(SessionStore::in_memory(&config.store_id));
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let client = ApiClient::builder(config)
            .session(session.clone())
            .notifier(notifier.clone())
            .navigator(navigator.clone())
            .build()
            .unwrap();
        Harness {
            client,
            session,
            notifier,
            navigator,
        }
    }

    async fn harness_for_server() -> Harness {
        let base_url = spawn_server().await;
        harness(ClientConfig::new(&base_url))
    }

    // ── Tests ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_success_resolves_payload_unchanged() {
        let h = harness_for_server().await;

        let result = h
            .client
            .get::<User, _>("/user", &json!({ "id": 7 }), RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(result.code, Some(ResultCode::SUCCESS));
        assert_eq!(
            result.data,
            User {
                id: 7,
                name: "ada".to_string()
            }
        );
        assert!(h.notifier.errors().is_empty());
        assert!(h.client.pending().is_empty());
    }

    #[tokio::test]
    async fn test_token_header_injected() {
        let h = harness_for_server().await;
        h.session.set_token("secret-token".to_string()).await;

        let result = h
            .client
            .get::<String, _>("/token", (), RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(result.data, "secret-token");
    }

    #[tokio::test]
    async fn test_empty_token_still_sends_header() {
        let h = harness_for_server().await;

        let result = h
            .client
            .get::<String, _>("/token", (), RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(result.data, "");
    }

    #[tokio::test]
    async fn test_put_and_delete() {
        let h = harness_for_server().await;
        let user = User {
            id: 3,
            name: "grace".to_string(),
        };

        let updated = h
            .client
            .put::<User, _>("/user", &user, RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(updated.data, user);
        assert_eq!(updated.msg, "updated");

        let deleted = h
            .client
            .delete::<String, _>("/user", &json!({ "id": 3 }), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(deleted.code, Some(200));
        assert_eq!(deleted.data, "3");
    }

    #[tokio::test]
    async fn test_session_expiry_clears_token_and_navigates() {
        let h = harness_for_server().await;
        h.session.set_token("stale-token".to_string()).await;
        h.session.set_user_info(UserInfo::named("Ada")).await;

        let err = h
            .client
            .get::<Value, _>("/expired", (), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired { ref msg } if msg == "Login has expired"));
        assert_eq!(h.session.token().await, "");
        assert_eq!(h.session.user_info().await.name, "Ada");
        assert_eq!(h.navigator.routes(), vec!["/login".to_string()]);
        assert_eq!(h.notifier.errors(), vec!["Login has expired".to_string()]);
    }

    #[tokio::test]
    async fn test_session_expiry_uses_configured_login_url() {
        let base_url = spawn_server().await;
        let h = harness(ClientConfig::new(&base_url).with_login_url("/auth/sign-in"));

        let _ = h
            .client
            .get::<Value, _>("/expired", (), RequestOptions::default())
            .await;

        assert_eq!(h.navigator.routes(), vec!["/auth/sign-in".to_string()]);
    }

    #[tokio::test]
    async fn test_business_error_notifies_and_rejects() {
        let h = harness_for_server().await;
        h.session.set_token("valid".to_string()).await;

        let err = h
            .client
            .post::<Value, _>("/failed", &json!({ "amount": 10 }), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Business { code: 500, ref msg } if msg == "Insufficient balance"
        ));
        assert_eq!(h.notifier.errors(), vec!["Insufficient balance".to_string()]);
        assert_eq!(h.session.token().await, "valid");
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_http_status_uses_status_message() {
        let h = harness_for_server().await;

        let err = h
            .client
            .get::<Value, _>("/forbidden", (), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 403));
        assert_eq!(
            h.notifier.errors(),
            vec!["The current account has no permission to access this resource!".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_route_maps_to_not_found() {
        let h = harness_for_server().await;

        let err = h
            .client
            .get::<Value, _>("/missing", (), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 404));
        assert_eq!(
            h.notifier.errors(),
            vec!["The resource you are accessing does not exist!".to_string()]
        );
    }

    #[tokio::test]
    async fn test_duplicate_request_cancels_older() {
        let h = harness_for_server().await;

        let first = h
            .client
            .get::<String, _>("/slow", (), RequestOptions::default());
        let second = h
            .client
            .get::<String, _>("/slow", (), RequestOptions::default());
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, Err(ApiError::Cancelled)));
        assert_eq!(second.unwrap().data, "slow");
        // Cancellation is silent.
        assert!(h.notifier.errors().is_empty());
        assert!(h.client.pending().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_request_kept_when_cancel_disabled() {
        let h = harness_for_server().await;
        let opts = RequestOptions::default().no_cancel();

        let first = h.client.get::<String, _>("/slow", (), opts.clone());
        let second = h.client.get::<String, _>("/slow", (), opts);
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().data, "slow");
        assert_eq!(second.unwrap().data, "slow");
    }

    #[tokio::test]
    async fn test_different_params_are_not_duplicates() {
        let h = harness_for_server().await;

        let first_params = json!({ "id": 1 });
        let second_params = json!({ "id": 2 });
        let first = h
            .client
            .get::<User, _>("/user", &first_params, RequestOptions::default());
        let second = h
            .client
            .get::<User, _>("/user", &second_params, RequestOptions::default());
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().data.id, 1);
        assert_eq!(second.unwrap().data.id, 2);
    }

    #[tokio::test]
    async fn test_timeout_notifies_timeout_message() {
        let base_url = spawn_server().await;
        let h = harness(ClientConfig::new(&base_url).with_timeout(Duration::from_millis(50)));

        let err = h
            .client
            .get::<String, _>("/slow", (), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout(_)));
        assert_eq!(h.notifier.errors(), vec![TIMEOUT_MESSAGE.to_string()]);
        assert!(h.client.pending().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_notifies_network_message() {
        // Reserve a port, then free it so nothing is listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let h = harness(ClientConfig::new(&format!("http://127.0.0.1:{}", port)));

        let err = h
            .client
            .get::<Value, _>("/anything", (), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(h.notifier.errors(), vec![NETWORK_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_download_returns_raw_bytes() {
        let h = harness_for_server().await;

        let bytes = h
            .client
            .download("/download", &json!({ "fileId": 9 }), RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(bytes, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn test_loading_indicator_balanced() {
        let h = harness_for_server().await;

        let _ = h
            .client
            .get::<User, _>("/user", &json!({ "id": 1 }), RequestOptions::default())
            .await;
        let _ = h
            .client
            .get::<Value, _>("/expired", (), RequestOptions::default())
            .await;
        let _ = h
            .client
            .get::<User, _>("/user", &json!({ "id": 1 }), RequestOptions::default().silent())
            .await;

        assert_eq!(h.notifier.shown.load(Ordering::SeqCst), 2);
        assert_eq!(h.notifier.hidden.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_payload_shape_mismatch_is_decode_error() {
        let h = harness_for_server().await;

        let err = h
            .client
            .get::<Vec<u32>, _>("/user", &json!({ "id": 1 }), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_envelope_without_data_resolves_null() {
        let h = harness_for_server().await;

        let result = h
            .client
            .get::<Value, _>("/no-data", (), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(result.code, Some(ResultCode::SUCCESS));
        assert_eq!(result.msg, "deleted");
        assert_eq!(result.data, Value::Null);

        let unit = h
            .client
            .get::<(), _>("/no-data", (), RequestOptions::default())
            .await;
        assert!(unit.is_ok());
        assert!(h.notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_non_object_query_params_rejected() {
        let h = harness_for_server().await;

        let err = h
            .client
            .get::<Value, _>("/user", &json!(["x"]), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Query(_)));
        assert!(h.client.pending().is_empty());
        assert_eq!(h.notifier.shown.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_per_request_headers_sent() {
        let h = harness_for_server().await;
        h.session.set_token("session-token".to_string()).await;

        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", HeaderValue::from_static("trace-42"));
        headers.insert("x-access-token", HeaderValue::from_static("caller-token"));

        let result = h
            .client
            .get::<Value, _>("/trace", (), RequestOptions::default().with_headers(headers))
            .await
            .unwrap();

        assert_eq!(result.data["trace"], "trace-42");
        // The session token replaces a caller-supplied token header.
        assert_eq!(result.data["token"], "session-token");
    }

    #[tokio::test]
    async fn test_per_request_timeout_overrides_client_timeout() {
        let h = harness_for_server().await;

        let err = h
            .client
            .get::<String, _>(
                "/slow",
                (),
                RequestOptions::default().with_timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout(_)));
        assert_eq!(h.notifier.errors(), vec![TIMEOUT_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_string_body_sent_form_encoded() {
        let h = harness_for_server().await;

        let result = h
            .client
            .post::<Value, _>("/form", "a=1&b=2", RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(
            result.data["contentType"],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(result.data["body"], "a=1&b=2");
    }
}
