//! Authenticated portal session.
//!
//! [`Session`] owns the HTTP client, the cookie jar and the credentials,
//! and gives the endpoint layer a single request primitive that detects
//! server-side logout and renews the session transparently. Expiry is not
//! signalled by a status code: the portal answers `200 OK` with a redirect
//! chain ending at the login page, so every validated request inspects the
//! final URL it landed on.

mod jar;

pub use jar::{CookieJar, StoredCookie};

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use regex::Regex;
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::consts;
use crate::error::{Error, Result};
use crate::recognizer::{JcssRecognizer, Recognizer};

/// Login retry schedule: five quick attempts, then a linear backoff.
fn default_retry_schedule() -> Vec<Duration> {
    let mut schedule = vec![Duration::from_millis(500); 5];
    schedule.extend((1..5).map(Duration::from_secs));
    schedule
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Per-request knobs for [`Session::request`].
///
/// The defaults give the behavior endpoint code wants: the response is
/// checked for session expiry and an expired session is renewed once.
pub struct RequestOptions {
    /// Inspect the final URL for the login page and treat it as expiry.
    pub validate_session: bool,
    /// On detected expiry, renew the session and resend once.
    pub auto_renew: bool,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(&'static str, &'static str)>,
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            validate_session: true,
            auto_renew: true,
            query: Vec::new(),
            form: Vec::new(),
            headers: Vec::new(),
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Options for requests that are part of the login flow itself.
    #[must_use]
    fn unvalidated() -> Self {
        Self {
            validate_session: false,
            ..Self::default()
        }
    }
}

/// Serializable session state for [`Session::dump`] / [`Session::load`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionData {
    pub username: Option<String>,
    pub password: Option<String>,
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub cache_store: HashMap<String, Value>,
}

/// An authenticated session against the portal.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct Session {
    client: reqwest::Client,
    jar: Arc<CookieJar>,
    base_url: Url,
    sso_base_url: Url,
    recognizer: Arc<dyn Recognizer>,
    credentials: StdMutex<Option<Credentials>>,
    /// Serializes login and renewal so concurrent expired requests do not
    /// race each other through the captcha flow. Guard drop on cancellation
    /// releases it safely.
    login_lock: Mutex<()>,
    retry_schedule: Vec<Duration>,
    cache_store: StdMutex<HashMap<String, Value>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &self.credentials.lock().unwrap_or_else(|e| e.into_inner()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    base_url: String,
    sso_base_url: String,
    recognizer: Option<Arc<dyn Recognizer>>,
    cookies: Vec<StoredCookie>,
    retry_schedule: Vec<Duration>,
    timeout: Option<Duration>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            base_url: consts::DEFAULT_BASE_URL.to_owned(),
            sso_base_url: consts::DEFAULT_SSO_BASE_URL.to_owned(),
            recognizer: None,
            cookies: Vec::new(),
            retry_schedule: default_retry_schedule(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the portal base URL, e.g. for a test server.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the JAccount SSO base URL, e.g. for a test server.
    #[must_use]
    pub fn sso_url(mut self, sso_base_url: impl Into<String>) -> Self {
        self.sso_base_url = sso_base_url.into();
        self
    }

    /// Overrides the captcha recognizer.
    #[must_use]
    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Seeds the cookie jar, e.g. from a previous session. The cookies are
    /// not validated until the first authenticated request.
    #[must_use]
    pub fn cookies(mut self, cookies: Vec<StoredCookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Overrides the login retry delays. One login attempt is made per
    /// entry, sleeping the entry's duration after each failed attempt.
    #[must_use]
    pub fn retry_schedule(mut self, schedule: Vec<Duration>) -> Self {
        self.retry_schedule = schedule;
        self
    }

    /// Default timeout for every request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Session> {
        let base_url = Url::parse(&self.base_url).map_err(|_| Error::InvalidUrl {
            url: self.base_url.clone(),
        })?;
        let sso_base_url = Url::parse(&self.sso_base_url).map_err(|_| Error::InvalidUrl {
            url: self.sso_base_url.clone(),
        })?;

        let jar = Arc::new(CookieJar::new());
        jar.replace(self.cookies);

        let mut client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .gzip(true);
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        let client = client.build()?;

        Ok(Session {
            client,
            jar,
            base_url,
            sso_base_url,
            recognizer: self
                .recognizer
                .unwrap_or_else(|| Arc::new(JcssRecognizer::new())),
            credentials: StdMutex::new(None),
            login_lock: Mutex::new(()),
            retry_schedule: self.retry_schedule,
            cache_store: StdMutex::new(HashMap::new()),
        })
    }
}

impl Session {
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Creates a session against the production portal with defaults.
    pub fn new() -> Result<Self> {
        SessionBuilder::new().build()
    }

    /// Resolves a possibly relative endpoint path against the base URL.
    fn resolve(&self, url: &str) -> Result<Url> {
        self.base_url
            .join(url)
            .map_err(|_| Error::InvalidUrl { url: url.to_owned() })
    }

    /// Resolves an SSO endpoint path against the JAccount base URL.
    fn resolve_sso(&self, url: &str) -> Result<Url> {
        self.sso_base_url
            .join(url)
            .map_err(|_| Error::InvalidUrl { url: url.to_owned() })
    }

    fn is_login_page(url: &Url) -> bool {
        url.path() == consts::LOGIN_PAGE_PATH
    }

    fn stored_credentials(&self) -> Option<Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn store_credentials(&self, username: &str, password: &str) {
        *self.credentials.lock().unwrap_or_else(|e| e.into_inner()) = Some(Credentials {
            username: username.to_owned(),
            password: password.to_owned(),
        });
    }

    /// Sends a request, upgrading `http` to `https` once if the plain
    /// connection is refused. Campus mirrors still hand out `http` URLs
    /// while the servers only accept TLS.
    async fn send(&self, method: Method, url: Url, options: &RequestOptions) -> Result<Response> {
        let first = self.send_once(method.clone(), url.clone(), options).await;
        match first {
            Err(Error::Network(e)) if e.is_connect() && url.scheme() == "http" => {
                let mut https = url;
                // set_scheme only fails for invalid schemes
                let _ = https.set_scheme("https");
                debug!(url = %https, "retrying over https after connect failure");
                self.send_once(method, https, options).await
            }
            other => other,
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        options: &RequestOptions,
    ) -> Result<Response> {
        let mut request = self.client.request(method, url);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if !options.form.is_empty() {
            request = request.form(&options.form);
        }
        for (name, value) in &options.headers {
            request = request.header(*name, *value);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        Self::check_status(response)
    }

    fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(Error::ServiceUnavailable);
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    /// Sends a request with session validation per `options`.
    ///
    /// When validation is on and the response lands on the login page, the
    /// session is renewed under the login lock and the request resent once.
    /// A second landing on the login page is a hard expiry.
    #[instrument(level = "debug", skip(self, options), fields(%method, url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let target = self.resolve(url)?;
        self.request_url(method, target, options).await
    }

    async fn request_url(
        &self,
        method: Method,
        target: Url,
        options: RequestOptions,
    ) -> Result<Response> {
        let response = self.send(method.clone(), target.clone(), &options).await?;

        if !options.validate_session || !Self::is_login_page(response.url()) {
            return Ok(response);
        }

        let renewable = self.stored_credentials().is_some();
        if !options.auto_renew || !renewable {
            return Err(Error::SessionExpired { renewable });
        }

        debug!("session expired, renewing");
        // Renewal re-enters `request`, so the recursive edge must be boxed.
        Box::pin(self.renew()).await?;

        let response = self.send(method, target, &options).await?;
        if Self::is_login_page(response.url()) {
            return Err(Error::SessionExpired { renewable: true });
        }
        Ok(response)
    }

    /// GET with default options.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, RequestOptions::default()).await
    }

    pub async fn get_with(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, url, options).await
    }

    /// POST with default options.
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, url, options).await
    }

    /// Logs in with the JAccount captcha flow.
    ///
    /// One attempt is made per entry of the retry schedule; a rejected
    /// captcha or password sleeps the entry's delay and retries. Exhausting
    /// the schedule yields [`Error::LoginFailed`].
    #[instrument(level = "info", skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let _guard = self.login_lock.lock().await;
        self.login_locked(username, password).await
    }

    async fn login_locked(&self, username: &str, password: &str) -> Result<()> {
        for delay in &self.retry_schedule {
            if self.attempt_login(username, password).await? {
                self.store_credentials(username, password);
                self.flush_cache_store();
                info!(username, "logged in");
                return Ok(());
            }
            debug!(delay_ms = delay.as_millis() as u64, "login rejected, retrying");
            tokio::time::sleep(*delay).await;
        }
        Err(Error::LoginFailed)
    }

    /// One pass through the login flow. `Ok(false)` means the server
    /// rejected the captcha or password; hard failures are errors.
    async fn attempt_login(&self, username: &str, password: &str) -> Result<bool> {
        let login_page = self
            .request(Method::GET, consts::LOGIN_URL, RequestOptions::unvalidated())
            .await?;
        let login_url = login_page.url().clone();
        let body = login_page.text().await?;

        let Some(uuid) = extract_uuid(&body) else {
            // No login form was served. Either an existing SSO token got us
            // straight through, or the portal answered something unusable.
            return Ok(!Self::is_login_page(&login_url));
        };

        let captcha_image = self
            .request_url(
                Method::GET,
                self.resolve_sso(consts::CAPTCHA_PATH)?,
                RequestOptions {
                    query: vec![
                        ("uuid".to_owned(), uuid.clone()),
                        ("t".to_owned(), chrono::Utc::now().timestamp_millis().to_string()),
                    ],
                    ..RequestOptions::unvalidated()
                },
            )
            .await?
            .bytes()
            .await?;
        let captcha = self.recognizer.recognize(&captcha_image).await?;

        let mut params: Vec<(String, String)> = login_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.push(("v".to_owned(), String::new()));
        params.push(("uuid".to_owned(), uuid));
        params.push(("user".to_owned(), username.to_owned()));
        params.push(("pass".to_owned(), password.to_owned()));
        params.push(("captcha".to_owned(), captcha));

        let result = self
            .request_url(
                Method::POST,
                self.resolve_sso(consts::LOGIN_POST_PATH)?,
                RequestOptions {
                    query: params,
                    headers: consts::LOGIN_HEADERS.to_vec(),
                    ..RequestOptions::unvalidated()
                },
            )
            .await?;

        let rejected = result
            .url()
            .query_pairs()
            .any(|(key, _)| key == "err");
        Ok(!rejected)
    }

    /// Renews an expired session: refreshes the SSO token, checks whether
    /// that alone restored authentication, and falls back to a full login
    /// with the stored credentials.
    async fn renew(&self) -> Result<()> {
        let _guard = self.login_lock.lock().await;

        self.request(Method::GET, consts::LOGIN_URL, RequestOptions::unvalidated())
            .await?;
        let home = self
            .request(Method::GET, consts::HOME_URL, RequestOptions::unvalidated())
            .await?;
        if !Self::is_login_page(home.url()) {
            debug!("session renewed by token refresh");
            return Ok(());
        }

        let creds = self
            .stored_credentials()
            .ok_or(Error::SessionExpired { renewable: false })?;
        self.login_locked(&creds.username, &creds.password).await
    }

    /// Logs out of the portal. With `purge` true the stored credentials
    /// are cleared as well; with `purge` false the cookies are restored
    /// afterwards, so the local session object stays usable while the
    /// server-side session is terminated.
    #[instrument(level = "info", skip(self))]
    pub async fn logout(&self, purge: bool) -> Result<()> {
        let backup = self.jar.snapshot();
        let result = self
            .request(Method::GET, consts::LOGOUT_URL, RequestOptions::unvalidated())
            .await;
        if purge {
            *self.credentials.lock().unwrap_or_else(|e| e.into_inner()) = None;
            self.flush_cache_store();
        } else {
            self.jar.replace(backup);
        }
        result.map(|_| ())
    }

    /// Current cookies, e.g. for persistence.
    #[must_use]
    pub fn cookies(&self) -> Vec<StoredCookie> {
        self.jar.snapshot()
    }

    /// Replaces the session cookies after validating that they carry an
    /// authenticated session. On failure the previous cookies are restored
    /// and [`Error::InvalidSession`] is returned.
    pub async fn set_cookies(&self, cookies: Vec<StoredCookie>) -> Result<()> {
        let backup = self.jar.snapshot();
        self.jar.replace(cookies);
        self.flush_cache_store();

        let validation = async {
            self.request(Method::GET, consts::LOGIN_URL, RequestOptions::unvalidated())
                .await?;
            let home = self
                .request(Method::GET, consts::HOME_URL, RequestOptions::unvalidated())
                .await?;
            if Self::is_login_page(home.url()) {
                Err(Error::InvalidSession)
            } else {
                Ok(())
            }
        }
        .await;

        if validation.is_err() {
            self.jar.replace(backup);
        }
        validation
    }

    /// Serializable snapshot of the whole session.
    #[must_use]
    pub fn data(&self) -> SessionData {
        let creds = self.stored_credentials();
        SessionData {
            username: creds.as_ref().map(|c| c.username.clone()),
            password: creds.map(|c| c.password),
            cookies: self.jar.snapshot(),
            cache_store: self
                .cache_store
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    /// Restores a dumped session: validates the cookies, falling back to a
    /// fresh login when they are stale and credentials are available.
    ///
    /// Missing credentials are tolerated with a warning; the restored
    /// session then cannot renew itself.
    pub async fn restore(&self, data: SessionData) -> Result<()> {
        let creds = match (data.username, data.password) {
            (Some(username), Some(password)) => {
                self.store_credentials(&username, &password);
                Some(Credentials { username, password })
            }
            _ => {
                warn!("session data carries no credentials; renewal is disabled");
                None
            }
        };

        if !data.cookies.is_empty() {
            match self.set_cookies(data.cookies).await {
                Ok(()) => {
                    *self.cache_store.lock().unwrap_or_else(|e| e.into_inner()) =
                        data.cache_store;
                    return Ok(());
                }
                Err(Error::InvalidSession) if creds.is_some() => {
                    debug!("dumped cookies are stale, logging in fresh");
                }
                Err(e) => return Err(e),
            }
        }

        match creds {
            Some(c) => self.login(&c.username, &c.password).await,
            None => {
                warn!("session data carries neither cookies nor credentials");
                Ok(())
            }
        }
    }

    /// Writes the session to a JSON file.
    pub async fn dump(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.data())?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Reads and restores a session previously written by [`dump`](Self::dump).
    pub async fn load(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let data: SessionData = serde_json::from_slice(&bytes)?;
        self.restore(data).await
    }

    pub(crate) fn cache_value(&self, key: &str) -> Option<Value> {
        self.cache_store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub(crate) fn store_value(&self, key: &str, value: Value) {
        self.cache_store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_owned(), value);
    }

    /// Cleared whenever the cookies change; everything in it was derived
    /// from the old session.
    fn flush_cache_store(&self) {
        self.cache_store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

fn extract_uuid(login_page: &str) -> Option<String> {
    // `uuid": 'xxxx'` inside the login page's inline script
    static PATTERN: &str = r#"uuid": '([^']+)'"#;
    let re = Regex::new(PATTERN).ok()?;
    re.captures(login_page)
        .map(|caps| caps[1].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_production_base_url() {
        let session = Session::new().unwrap();
        assert_eq!(session.base_url.as_str(), "https://i.sjtu.edu.cn/");
    }

    #[test]
    fn builder_rejects_garbage_base_url() {
        assert!(matches!(
            SessionBuilder::new().base_url("not a url").build(),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let session = Session::new().unwrap();
        let url = session.resolve(consts::HOME_URL).unwrap();
        assert_eq!(url.as_str(), "https://i.sjtu.edu.cn/xtgl/index_initMenu.html");

        let sso = session.resolve_sso(consts::LOGIN_POST_PATH).unwrap();
        assert_eq!(sso.host_str(), Some("jaccount.sjtu.edu.cn"));
    }

    #[test]
    fn debug_output_redacts_password() {
        let session = Session::new().unwrap();
        session.store_credentials("student", "hunter2");
        let debug = format!("{session:?}");
        assert!(debug.contains("student"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn uuid_extraction() {
        let page = r#"var data = { captcha: true, uuid": 'abc-123-def' };"#;
        assert_eq!(extract_uuid(page).as_deref(), Some("abc-123-def"));
        assert!(extract_uuid("no uuid here").is_none());
    }

    #[test]
    fn login_page_detection() {
        let expired: Url = "https://i.sjtu.edu.cn/xtgl/login_slogin.html".parse().unwrap();
        let home: Url = "https://i.sjtu.edu.cn/xtgl/index_initMenu.html".parse().unwrap();
        assert!(Session::is_login_page(&expired));
        assert!(!Session::is_login_page(&home));
    }

    #[test]
    fn retry_schedule_shape() {
        let schedule = default_retry_schedule();
        assert_eq!(schedule.len(), 9);
        assert_eq!(schedule[0], Duration::from_millis(500));
        assert_eq!(schedule[8], Duration::from_secs(4));
    }

    #[test]
    fn cache_store_round_trip() {
        let session = Session::new().unwrap();
        session.store_value("term_start", Value::from("2023-09-11"));
        assert_eq!(session.cache_value("term_start"), Some(Value::from("2023-09-11")));

        session.flush_cache_store();
        assert_eq!(session.cache_value("term_start"), None);
    }
}
