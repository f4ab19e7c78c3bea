//! Shared fixtures for the integration tests: a deterministic captcha
//! recognizer, a session wired to a wiremock server, and mounts for the
//! login flow pages.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use isjtu::{Recognizer, Session, SessionBuilder};

pub const HOME_PATH: &str = "/xtgl/index_initMenu.html";
pub const LOGIN_PAGE_PATH: &str = "/xtgl/login_slogin.html";

pub const LOGIN_FORM_BODY: &str =
    r#"<script>var loginInfo = { "uuid": 'u-1', captcha: true };</script>"#;
pub const HOME_BODY: &str = r#"<input type="hidden" id="sessionUserKey" value="123456789"/>"#;

/// Recognizer that always answers the same text.
pub struct FixedRecognizer(pub &'static str);

#[async_trait]
impl Recognizer for FixedRecognizer {
    async fn recognize(&self, _image: &[u8]) -> isjtu::Result<String> {
        Ok(self.0.to_owned())
    }
}

/// A session pointed at the mock server, with zero retry delays.
pub fn session_for(server: &MockServer) -> Session {
    SessionBuilder::new()
        .base_url(server.uri())
        .sso_url(server.uri())
        .recognizer(Arc::new(FixedRecognizer("abcd")))
        .retry_schedule(vec![Duration::ZERO; 3])
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Mounts the JAccount login form and its captcha image.
pub async fn mount_login_form(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/jaccountlogin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM_BODY))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jaccount/captcha"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
        .mount(server)
        .await;
}

/// Mounts the authenticated home page.
pub async fn mount_home(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOME_BODY))
        .mount(server)
        .await;
}

/// Mounts the page the portal redirects expired sessions to.
pub async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("please log in"))
        .mount(server)
        .await;
}

/// The SSO response for an accepted login: a session cookie and a
/// redirect to the home page.
pub fn login_success_response() -> ResponseTemplate {
    ResponseTemplate::new(302)
        .insert_header("Location", HOME_PATH)
        .insert_header("Set-Cookie", "JSESSIONID=mock-session; Path=/")
}

pub async fn mount_login_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/jaccount/ulogin"))
        .respond_with(login_success_response())
        .mount(server)
        .await;
}

/// Mounts the whole login flow and returns a session that completed it.
pub async fn logged_in_session(server: &MockServer) -> Session {
    mount_login_form(server).await;
    mount_home(server).await;
    mount_login_page(server).await;
    mount_login_success(server).await;

    let session = session_for(server);
    session.login("student", "hunter2").await.unwrap();
    session
}
