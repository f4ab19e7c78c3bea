//! Captcha recognition.
//!
//! The login flow treats the recognizer as a black box turning a captcha
//! image into a short text guess. The default implementation posts the
//! image to a remote solver service; tests and alternative deployments
//! plug in their own via the [`Recognizer`] trait.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Default public solver instance.
const DEFAULT_SOLVER_URL: &str = "https://jcss.lightquantum.me";

/// Turns a captcha image into its text.
///
/// Implementations may perform network I/O. A wrong guess is not an error;
/// the login loop simply retries. `recognize` should only fail when the
/// recognizer itself is unusable.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

/// Remote captcha solver client (JAccount Captcha Solver Service).
///
/// The model runs server-side, so no local ML runtime is needed.
#[derive(Debug, Clone)]
pub struct JcssRecognizer {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SolverResponse {
    data: SolverPrediction,
}

#[derive(Debug, Deserialize)]
struct SolverPrediction {
    prediction: String,
}

impl JcssRecognizer {
    /// Creates a recognizer against the public solver instance.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(DEFAULT_SOLVER_URL)
    }

    /// Creates a recognizer against a self-hosted solver.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl Default for JcssRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Recognizer for JcssRecognizer {
    #[instrument(level = "debug", skip_all, fields(bytes = image.len()))]
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(image.to_vec()).file_name("captcha");
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::recognizer(format!("solver request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::recognizer(format!(
                "solver returned status {}",
                response.status().as_u16()
            )));
        }

        let parsed: SolverResponse = response
            .json()
            .await
            .map_err(|e| Error::recognizer(format!("malformed solver response: {e}")))?;

        debug!(prediction = %parsed.data.prediction, "captcha recognized");
        Ok(parsed.data.prediction)
    }
}
