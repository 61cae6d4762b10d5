//! File credential provider tests.

use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use testledger_core::{CellRange, Config, LedgerError};
use testledger_http::{
    CredentialProvider, FileCredentialProvider, HttpSheetsRpc, RemoteAccess, SheetsRpc, ValueRender,
};
use tempfile::tempdir;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn client_description(token_uri: Option<String>) -> serde_json::Value {
    let mut installed = json!({
        "client_id": "client-1",
        "client_secret": "shh",
        "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
    });
    if let Some(uri) = token_uri {
        installed["token_uri"] = json!(uri);
    }
    json!({ "installed": installed })
}

#[tokio::test]
async fn test_missing_credential_file() {
    let dir = tempdir().unwrap();
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    let err = provider.access_token().await.unwrap_err();
    assert!(matches!(err, LedgerError::Credential(_)));
    assert!(err.to_string().contains("gsheet-auth.json"));
}

#[tokio::test]
async fn test_malformed_credential_file() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("gsheet-auth.json"), "{\"installed\": ").unwrap();
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    let err = provider.access_token().await.unwrap_err();
    assert!(err.to_string().contains("malformed credential description"));
}

#[tokio::test]
async fn test_credential_file_without_client() {
    let dir = tempdir().unwrap();
    write_json(&dir.path().join("gsheet-auth.json"), &json!({"other": {}}));
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    let err = provider.access_token().await.unwrap_err();
    assert!(err.to_string().contains("no 'installed' or 'web' client"));
}

#[tokio::test]
async fn test_missing_token_asks_for_authorization() {
    let dir = tempdir().unwrap();
    write_json(&dir.path().join("gsheet-auth.json"), &client_description(None));
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    let err = provider.access_token().await.unwrap_err();
    assert!(err.to_string().contains("authorize this client first"));
}

#[tokio::test]
async fn test_loads_persisted_token() {
    let dir = tempdir().unwrap();
    write_json(&dir.path().join("gsheet-auth.json"), &client_description(None));
    write_json(
        &dir.path().join("token.json"),
        &json!({
            "access_token": "ya29.persisted",
            "refresh_token": "1//refresh",
            "scope": "https://www.googleapis.com/auth/spreadsheets",
            "token_type": "Bearer",
            "expiry_date": Utc::now().timestamp_millis() + 3_600_000
        }),
    );

    let config = Config::new(Some(dir.path().to_path_buf()), None, None);
    let token = FileCredentialProvider::from_config(&config)
        .access_token()
        .await
        .unwrap();
    assert_eq!(token.secret(), "ya29.persisted");
}

#[tokio::test]
async fn test_token_without_expiry_is_used_as_is() {
    let dir = tempdir().unwrap();
    write_json(&dir.path().join("gsheet-auth.json"), &client_description(None));
    write_json(&dir.path().join("token.json"), &json!({"access_token": "plain"}));
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    assert_eq!(provider.access_token().await.unwrap().secret(), "plain");
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_partial_json(json!({
            "client_id": "client-1",
            "refresh_token": "1//refresh",
            "grant_type": "refresh_token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    write_json(
        &dir.path().join("gsheet-auth.json"),
        &client_description(Some(format!("{}/token", server.uri()))),
    );
    write_json(
        &dir.path().join("token.json"),
        &json!({
            "access_token": "ya29.stale",
            "refresh_token": "1//refresh",
            "expiry_date": Utc::now().timestamp_millis() - 1000
        }),
    );
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    assert_eq!(provider.access_token().await.unwrap().secret(), "ya29.fresh");
}

#[tokio::test]
async fn test_expired_token_without_refresh_token() {
    let dir = tempdir().unwrap();
    write_json(&dir.path().join("gsheet-auth.json"), &client_description(None));
    write_json(
        &dir.path().join("token.json"),
        &json!({"access_token": "ya29.stale", "expiry_date": 1}),
    );
    let provider = FileCredentialProvider::new(dir.path().join("gsheet-auth.json"), dir.path().join("token.json"));

    let err = provider.access_token().await.unwrap_err();
    assert!(err.to_string().contains("no refresh token"));
}

#[tokio::test]
async fn test_access_without_credentials_yields_no_data() {
    let dir = tempdir().unwrap();
    let config = Config::new(Some(dir.path().to_path_buf()), None, None)
        .with_pacing(testledger_core::Pacing::none());
    let access = RemoteAccess::from_config(&config);

    let err = access.get_session("doc1").await.err().unwrap();
    assert!(matches!(err, LedgerError::Session { .. }));
    assert_eq!(access.read_range("Run1", "C", 5, "C", 14, "doc1").await, None);
}

fn refresh_response(token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": token,
        "expires_in": expires_in,
        "token_type": "Bearer"
    }))
}

/// Provider whose persisted token has already expired, refreshing against `server`.
fn expired_provider(dir: &Path, server: &MockServer) -> FileCredentialProvider {
    write_json(
        &dir.join("gsheet-auth.json"),
        &client_description(Some(format!("{}/token", server.uri()))),
    );
    write_json(
        &dir.join("token.json"),
        &json!({
            "access_token": "ya29.stale",
            "refresh_token": "1//refresh",
            "expiry_date": Utc::now().timestamp_millis() - 1000
        }),
    );
    FileCredentialProvider::new(dir.join("gsheet-auth.json"), dir.join("token.json"))
}

#[tokio::test]
async fn test_refreshed_token_is_reused_until_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(refresh_response("ya29.fresh", 3599))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let provider = expired_provider(dir.path(), &server);

    assert_eq!(provider.access_token().await.unwrap().secret(), "ya29.fresh");
    assert_eq!(provider.access_token().await.unwrap().secret(), "ya29.fresh");
}

#[tokio::test]
async fn test_token_expiring_between_calls_is_refreshed() {
    let server = MockServer::start().await;
    // The first refresh hands out a token that is already inside the expiry margin.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(refresh_response("ya29.first", 0))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(refresh_response("ya29.second", 3599))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/doc1/values/Run1!C5:C5"))
        .and(bearer_token("ya29.first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": [["login"]]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/doc1/values/Run1!C5:C5"))
        .and(bearer_token("ya29.second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": [["logout"]]})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let provider = expired_provider(dir.path(), &server);
    let rpc = HttpSheetsRpc::new(&server.uri(), Arc::new(provider)).unwrap();
    let range = CellRange::cell("Run1", "C", 5);

    let first = rpc.get_range("doc1", &range, ValueRender::Formatted).await.unwrap();
    let second = rpc.get_range("doc1", &range, ValueRender::Formatted).await.unwrap();
    assert_eq!(first, vec![vec!["login".to_string()]]);
    assert_eq!(second, vec![vec!["logout".to_string()]]);
}
