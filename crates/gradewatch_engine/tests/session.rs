use std::sync::{Arc, Once};

use gradewatch_engine::{
    AuthenticationError, Credentials, FailureKind, FetchSettings, LoginSettings, NoProgress,
    ReqwestFetcher, SessionError, SessionManager, SessionState,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r#"<html><body>
<form action="/login?tx_felogin_login%5Baction%5D=login" method="post">
  <input type="hidden" name="logintype" value="login">
  <input type="hidden" name="__RequestToken" value="tok-42">
  <input type="text" name="user">
  <input type="password" name="pass">
</form>
</body></html>"#;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

fn manager(server: &MockServer) -> SessionManager {
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).expect("client builds");
    SessionManager::new(
        Arc::new(fetcher),
        LoginSettings::for_url(format!("{}/login", server.uri())),
    )
}

fn credentials() -> Credentials {
    Credentials::new("alice", "s3cret")
}

async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_session_fetches_document_without_login() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    let document = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .expect("document");
    assert_eq!(document.bytes, b"%PDF-1.4");
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn document_with_error_status_fails_without_login() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("%PDF-1.4", "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    let err = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .unwrap_err();
    match err {
        SessionError::Fetch(fetch) => assert_eq!(fetch.kind, FailureKind::HttpStatus(404)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Unverified);
}

#[tokio::test]
async fn login_page_with_broken_encoding_still_submits_form() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .and(header("cookie", "fe_typo_user=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .mount(&server)
        .await;
    // Declared UTF-8, but the heading is Latin-1.
    let mut page = b"<h1>Anmeldung f\xfcr Studierende</h1>".to_vec();
    page.extend_from_slice(LOGIN_PAGE.as_bytes());
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html; charset=utf-8"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("__RequestToken=tok-42"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "fe_typo_user=abc123; Path=/")
                .set_body_raw("<html>Willkommen</html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .expect("document after login");
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[test]
fn login_settings_use_portal_field_names() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).expect("client builds");
    let session = SessionManager::new(
        Arc::new(fetcher),
        LoginSettings::for_url("https://portal.example/login"),
    );

    let settings = session.settings();
    assert_eq!(settings.login_url, "https://portal.example/login");
    assert_eq!(settings.username_field, "user");
    assert_eq!(settings.password_field, "pass");
    assert_eq!(
        settings.failure_markers,
        vec!["Anmeldefehler".to_string(), "Login fehlgeschlagen".to_string()]
    );
}

#[tokio::test]
async fn expired_session_logs_in_and_retries_once() {
    init_logging();
    let server = MockServer::start().await;
    // Mounted first so it wins once the session cookie is present.
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .and(header("cookie", "fe_typo_user=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("logintype=login"))
        .and(body_string_contains("__RequestToken=tok-42"))
        .and(body_string_contains("user=alice"))
        .and(body_string_contains("pass=s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "fe_typo_user=abc123; Path=/")
                .set_body_raw("<html>Willkommen</html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = manager(&server);
    assert_eq!(session.state(), SessionState::Unverified);
    let url = format!("{}/transcript", server.uri());

    let document = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .expect("document after login");
    assert_eq!(document.bytes, b"%PDF-1.4");
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn missing_login_form_is_authentication_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>maintenance</html>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>maintenance</html>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    let err = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Authentication(AuthenticationError::FormNotFound { .. })
    ));
    assert_eq!(session.state(), SessionState::Unverified);
}

#[tokio::test]
async fn rejected_credentials_report_marker() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><p>Anmeldefehler</p></html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    let err = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .unwrap_err();
    match err {
        SessionError::Authentication(AuthenticationError::Rejected { marker }) => {
            assert_eq!(marker, "Anmeldefehler");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Unverified);
}

#[tokio::test]
async fn retry_without_document_is_unexpected_content_type() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .expect(2)
        .mount(&server)
        .await;
    mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html"))
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    let err = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .unwrap_err();
    match err {
        SessionError::Fetch(fetch) => assert!(matches!(
            fetch.kind,
            FailureKind::UnexpectedContentType { .. }
        )),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Unverified);
}

#[tokio::test]
async fn failing_retry_is_http_status_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .and(header("cookie", "fe_typo_user=abc123"))
        .respond_with(ResponseTemplate::new(503).set_body_raw("busy", "text/plain"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transcript"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LOGIN_PAGE, "text/html"))
        .mount(&server)
        .await;
    mount_login_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "fe_typo_user=abc123; Path=/")
                .set_body_raw("<html>ok</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let mut session = manager(&server);
    let url = format!("{}/transcript", server.uri());

    let err = session
        .fetch_document(&url, &credentials(), &NoProgress)
        .await
        .unwrap_err();
    match err {
        SessionError::Fetch(fetch) => assert_eq!(fetch.kind, FailureKind::HttpStatus(503)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Unverified);
}
