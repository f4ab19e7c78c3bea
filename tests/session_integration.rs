//! Integration tests for the session lifecycle: login, transparent
//! renewal, cookie assignment and persistence, against a wiremock
//! stand-in for the portal and the SSO service.

mod support;

use std::sync::Arc;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use isjtu::{Client, Error, StoredCookie};
use support::{
    HOME_PATH, LOGIN_PAGE_PATH, logged_in_session, login_success_response, mount_home,
    mount_login_form, mount_login_page, session_for,
};

// ---- Integration test: login flow ----

#[tokio::test]
async fn login_posts_credentials_and_captcha() {
    let server = MockServer::start().await;
    mount_login_form(&server).await;
    mount_home(&server).await;

    Mock::given(method("POST"))
        .and(path("/jaccount/ulogin"))
        .and(query_param("uuid", "u-1"))
        .and(query_param("user", "student"))
        .and(query_param("captcha", "abcd"))
        .respond_with(login_success_response())
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.login("student", "hunter2").await.unwrap();
    assert!(!session.cookies().is_empty());
}

#[tokio::test]
async fn login_retries_after_rejected_captcha() {
    let server = MockServer::start().await;
    mount_login_form(&server).await;
    mount_home(&server).await;

    // first attempt bounces back to the login page with an error marker
    Mock::given(method("POST"))
        .and(path("/jaccount/ulogin"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/jaccountlogin?err=1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    support::mount_login_success(&server).await;

    let session = session_for(&server);
    session.login("student", "hunter2").await.unwrap();
}

#[tokio::test]
async fn login_fails_after_exhausting_the_schedule() {
    let server = MockServer::start().await;
    mount_login_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/jaccount/ulogin"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/jaccountlogin?err=1"))
        .mount(&server)
        .await;

    let session = session_for(&server);
    assert!(matches!(
        session.login("student", "wrong").await,
        Err(Error::LoginFailed)
    ));
}

// ---- Integration test: session expiry and renewal ----

#[tokio::test]
async fn expired_session_renews_and_resends_once() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    // first schedule call lands on the login page, second one succeeds
    Mock::given(method("POST"))
        .and(path("/kbcx/xskbcx_cxXsKb.html"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN_PAGE_PATH))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/kbcx/xskbcx_cxXsKb.html"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kbList": [{
                "kcmc": "高等数学",
                "xqj": 1,
                "zcd": "1-16周",
                "jcs": "3-4节",
                "kch_id": "MA001",
                "jxbmc": "MA001-1",
                "jxb_id": "A1"
            }]
        })))
        .mount(&server)
        .await;

    let client = Client::new(Arc::new(session));
    let schedule = client.schedule(2023, 0).await.unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].name, "高等数学");
}

#[tokio::test]
async fn expired_session_without_credentials_is_not_renewable() {
    let server = MockServer::start().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/kbcx/xskbcx_cxXsKb.html"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN_PAGE_PATH))
        .mount(&server)
        .await;

    // never logged in, so there is nothing to renew with
    let session = session_for(&server);
    let client = Client::new(Arc::new(session));
    assert!(matches!(
        client.schedule(2023, 0).await,
        Err(Error::SessionExpired { renewable: false })
    ));
}

#[tokio::test]
async fn ineffective_renewal_is_a_hard_expiry() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    // the portal keeps bouncing this endpoint no matter how often we renew
    Mock::given(method("POST"))
        .and(path("/kbcx/xskbcx_cxXsKb.html"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN_PAGE_PATH))
        .mount(&server)
        .await;

    let client = Client::new(Arc::new(session));
    assert!(matches!(
        client.schedule(2023, 0).await,
        Err(Error::SessionExpired { renewable: true })
    ));
}

#[tokio::test]
async fn maintenance_surfaces_as_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = session_for(&server);
    assert!(matches!(
        session.get(HOME_PATH).await,
        Err(Error::ServiceUnavailable)
    ));
}

// ---- Integration test: cookie assignment and persistence ----

#[tokio::test]
async fn stale_cookie_assignment_rolls_back() {
    let server = MockServer::start().await;
    mount_login_form(&server).await;
    mount_login_page(&server).await;

    // home redirects to the login page, i.e. the cookies are worthless
    Mock::given(method("GET"))
        .and(path(HOME_PATH))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN_PAGE_PATH))
        .mount(&server)
        .await;

    let session = session_for(&server);
    let stale = vec![StoredCookie::new("127.0.0.1", "/", "JSESSIONID", "stale")];
    assert!(matches!(
        session.set_cookies(stale).await,
        Err(Error::InvalidSession)
    ));
    assert!(
        session.cookies().is_empty(),
        "rollback should restore the empty jar"
    );
}

#[tokio::test]
async fn dump_and_load_round_trip() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    session.dump(&file).await.unwrap();

    let restored = session_for(&server);
    restored.load(&file).await.unwrap();
    assert!(
        restored.cookies().iter().any(|c| c.name == "JSESSIONID"),
        "restored session should carry the dumped cookies"
    );
}

#[tokio::test]
async fn dump_does_not_leak_the_password_in_debug() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    let debug = format!("{session:?}");
    assert!(debug.contains("student"));
    assert!(!debug.contains("hunter2"));
}
