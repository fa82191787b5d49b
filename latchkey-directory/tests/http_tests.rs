use latchkey_directory::{Directory, DirectoryError, HttpDirectory, HttpDirectoryConfig};
use latchkey_types::UserId;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_directory(server: &MockServer) -> HttpDirectory {
    HttpDirectory::new(HttpDirectoryConfig {
        base_url: server.uri(),
        ..Default::default()
    })
}

// ── Config defaults ─────────────────────────────────────────────

#[test]
fn config_default() {
    let cfg = HttpDirectoryConfig::default();
    assert!(cfg.api_token.is_none());
    assert_eq!(cfg.timeout.as_secs(), 10);
}

// ── get_user ────────────────────────────────────────────────────

#[tokio::test]
async fn get_user_parses_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"entitlement": {"status": "active"}, "display_name": "Ada"}
        })))
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let profile = directory.get_user(&UserId::from("user_abc")).await.unwrap();
    assert_eq!(profile.metadata["display_name"], json!("Ada"));
    assert_eq!(profile.metadata["entitlement"]["status"], json!("active"));
}

#[tokio::test]
async fn get_user_missing_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let err = directory
        .get_user(&UserId::from("user_gone"))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NotFound(_)));
}

#[tokio::test]
async fn get_user_server_error_is_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_x"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let err = directory
        .get_user(&UserId::from("user_x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Network(_)));
}

#[tokio::test]
async fn get_user_garbage_body_is_bad_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let err = directory
        .get_user(&UserId::from("user_x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::BadResponse(_)));
}

// ── update_metadata ─────────────────────────────────────────────

#[tokio::test]
async fn update_patches_only_changed_keys() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"display_name": "Ada", "counter": 1}
        })))
        .mount(&server)
        .await;

    // Only the touched key goes over the wire.
    Mock::given(method("PATCH"))
        .and(path("/v1/users/user_abc/metadata"))
        .and(body_json(json!({"counter": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"display_name": "Ada", "counter": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let updated = directory
        .update_metadata(
            &UserId::from("user_abc"),
            Box::new(|metadata| {
                metadata.insert("counter".to_string(), json!(2));
            }),
        )
        .await
        .unwrap();

    assert_eq!(updated.metadata["counter"], json!(2));
    assert_eq!(updated.metadata["display_name"], json!("Ada"));
}

#[tokio::test]
async fn update_sends_removals_as_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"stale": true, "keep": "yes"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/users/user_abc/metadata"))
        .and(body_json(json!({"stale": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"keep": "yes"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let updated = directory
        .update_metadata(
            &UserId::from("user_abc"),
            Box::new(|metadata| {
                metadata.remove("stale");
            }),
        )
        .await
        .unwrap();

    assert!(!updated.metadata.contains_key("stale"));
}

#[tokio::test]
async fn noop_update_skips_the_patch_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"display_name": "Ada"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/users/user_abc/metadata"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let profile = directory
        .update_metadata(&UserId::from("user_abc"), Box::new(|_| {}))
        .await
        .unwrap();

    assert_eq!(profile.metadata["display_name"], json!("Ada"));
}

#[tokio::test]
async fn update_for_unknown_user_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let err = directory
        .update_metadata(
            &UserId::from("user_gone"),
            Box::new(|metadata| {
                metadata.insert("x".to_string(), json!(1));
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DirectoryError::NotFound(_)));
}

#[tokio::test]
async fn update_surfaces_patch_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"metadata": {}})))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/users/user_abc/metadata"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let directory = mock_directory(&server);
    let err = directory
        .update_metadata(
            &UserId::from("user_abc"),
            Box::new(|metadata| {
                metadata.insert("x".to_string(), json!(1));
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DirectoryError::Network(_)));
}

// ── Bearer auth ─────────────────────────────────────────────────

#[tokio::test]
async fn api_token_is_sent_as_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/users/user_abc"))
        .and(wiremock::matchers::header(
            "authorization",
            "Bearer directory-secret",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"metadata": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let directory = HttpDirectory::new(HttpDirectoryConfig {
        base_url: server.uri(),
        api_token: Some("directory-secret".to_string()),
        ..Default::default()
    });

    directory.get_user(&UserId::from("user_abc")).await.unwrap();
}
