//! High-level portal client.
//!
//! [`Client`] wraps a [`Session`] and exposes one method per portal
//! function: schedule, scores, exams, the course library, GPA statistics
//! and course selection. Methods live in per-function submodules; this
//! module carries the shared plumbing (student id discovery, the academic
//! calendar, and the paginated POST protocol).

mod course;
mod exam;
mod gpa;
mod profile;
mod schedule;
mod score;
mod selection;

pub use course::CourseFilter;
pub use selection::{SelectionClass, SelectionSector};

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::consts;
use crate::error::{Error, Result};
use crate::query::{Page, PageFetcher};
use crate::session::{RequestOptions, Session};

/// Entry point for every portal function.
///
/// Cheap to clone; clones share the underlying session.
#[derive(Debug, Clone)]
pub struct Client {
    session: Arc<Session>,
}

impl Client {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// The session this client operates on.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The numeric student id most endpoints require as an `su` parameter.
    ///
    /// Scraped from the portal home page on first use, then cached until
    /// the session cookies change.
    #[instrument(level = "debug", skip(self))]
    pub async fn student_id(&self) -> Result<String> {
        if let Some(Value::String(id)) = self.session.cache_value("student_id") {
            return Ok(id);
        }
        let home = self.session.get(consts::HOME_URL).await?.text().await?;
        let id = extract_student_id(&home)
            .ok_or_else(|| Error::parse("sessionUserKey", "<missing from home page>"))?;
        debug!(student_id = %id, "discovered student id");
        self.session
            .store_value("student_id", Value::String(id.clone()));
        Ok(id)
    }

    /// First day of the current term, from the academic calendar widget.
    pub async fn term_start_date(&self) -> Result<NaiveDate> {
        if let Some(Value::String(cached)) = self.session.cache_value("term_start_date") {
            if let Ok(date) = NaiveDate::parse_from_str(&cached, "%Y-%m-%d") {
                return Ok(date);
            }
        }
        let student_id = self.student_id().await?;
        let url = format!("{}{}", consts::CALENDAR_URL, student_id);
        let text = self.session.get(&url).await?.text().await?;

        // The calendar lists both term bounds; the earliest date is the start.
        let start = date_re()
            .find_iter(&text)
            .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
            .min()
            .ok_or_else(|| Error::parse("calendar", "<no dates in calendar page>"))?;
        self.session.store_value(
            "term_start_date",
            Value::String(start.format("%Y-%m-%d").to_string()),
        );
        Ok(start)
    }
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap_or_else(|_| unreachable!()))
}

fn extract_student_id(home_page: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"id="sessionUserKey" value="(\d+)""#).unwrap_or_else(|_| unreachable!())
    });
    re.captures(home_page).map(|caps| caps[1].to_owned())
}

/// Translates a term index (0, 1, 2) to the portal's `xqm` wire code.
pub(crate) fn term_code(term: u8) -> Result<u8> {
    consts::TERMS
        .get(usize::from(term))
        .copied()
        .ok_or(Error::IndexOutOfRange {
            index: isize::from(term),
            len: consts::TERMS.len(),
        })
}

pub(crate) fn timestamp_millis() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// The boilerplate fields every paginated POST endpoint expects.
pub(crate) fn paged_form(page: usize, count: usize) -> Vec<(String, String)> {
    vec![
        ("_search".to_owned(), "false".to_owned()),
        ("nd".to_owned(), timestamp_millis()),
        ("queryModel.showCount".to_owned(), count.to_string()),
        ("queryModel.currentPage".to_owned(), page.to_string()),
        ("queryModel.sortName".to_owned(), String::new()),
        ("queryModel.sortOrder".to_owned(), "asc".to_owned()),
        ("time".to_owned(), "1".to_owned()),
    ]
}

fn flex_usize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(usize),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not a count: `{s}`"))),
    }
}

/// Envelope of a paginated portal response.
#[derive(Debug, Deserialize)]
pub(crate) struct PagedPayload {
    #[serde(rename = "totalResult", deserialize_with = "flex_usize")]
    pub total: usize,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// [`PageFetcher`] over one paginated POST endpoint with fixed parameters.
pub(crate) struct PortalPageFetcher {
    session: Arc<Session>,
    url: String,
    params: Vec<(String, String)>,
}

impl PortalPageFetcher {
    pub(crate) fn new(session: Arc<Session>, url: String, params: Vec<(String, String)>) -> Self {
        Self {
            session,
            url,
            params,
        }
    }
}

#[async_trait]
impl PageFetcher for PortalPageFetcher {
    async fn fetch_page(&self, page: usize, count: usize) -> Result<Page> {
        let mut form = self.params.clone();
        form.extend(paged_form(page, count));
        let response = self
            .session
            .post(
                &self.url,
                RequestOptions {
                    form,
                    ..RequestOptions::default()
                },
            )
            .await?;
        let payload: PagedPayload = response.json().await?;
        Ok(Page {
            total: payload.total,
            items: payload.items,
        })
    }
}
