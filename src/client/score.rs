//! Score endpoints.

use serde_json::Value;
use tracing::instrument;

use super::{Client, paged_form, term_code};
use crate::consts;
use crate::error::Result;
use crate::models::{Score, ScoreFactor};
use crate::results::Results;
use crate::session::RequestOptions;

/// Page size large enough that a term's scores never paginate.
const SCORE_SHOW_COUNT: usize = 1000;

impl Client {
    /// Fetches the scores of the given academic year and term.
    #[instrument(level = "debug", skip(self))]
    pub async fn score(&self, year: u16, term: u8) -> Result<Results<Score>> {
        let mut form = vec![
            ("xnm".to_owned(), year.to_string()),
            ("xqm".to_owned(), term_code(term)?.to_string()),
        ];
        form.extend(paged_form(1, SCORE_SHOW_COUNT));

        let payload: Value = self
            .session()
            .post(
                consts::SCORE_URL,
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

    /// Fetches the per-factor breakdown of one score, identified by its
    /// teaching class id.
    #[instrument(level = "debug", skip(self))]
    pub async fn score_detail(
        &self,
        year: u16,
        term: u8,
        class_id: &str,
    ) -> Result<Vec<ScoreFactor>> {
        let student_id = self.student_id().await?;
        let mut form = vec![
            ("xnm".to_owned(), year.to_string()),
            ("xqm".to_owned(), term_code(term)?.to_string()),
            ("jxb_id".to_owned(), class_id.to_owned()),
        ];
        form.extend(paged_form(1, 15));

        let url = format!("{}{}", consts::SCORE_DETAIL_URL, student_id);
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

        let mut raw = payload
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        // The final item is a synthetic total row, not a factor.
        raw.pop();

        raw.into_iter()
            .map(|item| serde_json::from_value(item).map_err(Into::into))
            .collect()
    }
}
