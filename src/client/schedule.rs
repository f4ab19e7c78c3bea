//! Course schedule endpoint.

use serde_json::Value;
use tracing::instrument;

use super::{Client, term_code};
use crate::consts;
use crate::error::Result;
use crate::models::ScheduleCourse;
use crate::results::Results;
use crate::session::RequestOptions;

impl Client {
    /// Fetches the course schedule of the given academic year and term
    /// (0, 1 or 2).
    #[instrument(level = "debug", skip(self))]
    pub async fn schedule(&self, year: u16, term: u8) -> Result<Results<ScheduleCourse>> {
        let form = vec![
            ("xnm".to_owned(), year.to_string()),
            ("xqm".to_owned(), term_code(term)?.to_string()),
        ];
        let payload: Value = self
            .session()
            .post(
                consts::SCHEDULE_URL,
                RequestOptions {
                    form,
                    ..RequestOptions::default()
                },
            )
            .await?
            .json()
            .await?;

        let raw = payload
            .get("kbList")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Results::load(raw, year, term)
    }
}
