//! Exam arrangement endpoint.

use serde_json::Value;
use tracing::instrument;

use super::{Client, paged_form, term_code};
use crate::consts;
use crate::error::Result;
use crate::models::Exam;
use crate::results::Results;
use crate::session::RequestOptions;

const EXAM_SHOW_COUNT: usize = 500;

impl Client {
    /// Fetches the exam arrangements of the given academic year and term.
    #[instrument(level = "debug", skip(self))]
    pub async fn exam(&self, year: u16, term: u8) -> Result<Results<Exam>> {
        let student_id = self.student_id().await?;
        let mut form = vec![
            ("xnm".to_owned(), year.to_string()),
            ("xqm".to_owned(), term_code(term)?.to_string()),
            ("ksmcdmb_id".to_owned(), String::new()),
            ("kch".to_owned(), String::new()),
            ("kc".to_owned(), String::new()),
            ("ksrq".to_owned(), String::new()),
            ("kkbm_id".to_owned(), String::new()),
        ];
        form.extend(paged_form(1, EXAM_SHOW_COUNT));

        let url = format!("{}{}", consts::EXAM_URL, student_id);
        let payload: Value = self
            .session()
            .post(
                &url,
                RequestOptions {
                    form,
                    ..RequestOptions::default()
                },
            )
            .await?
            .json()
            .await?;

        let raw = payload
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Results::load(raw, year, term)
    }
}
