//! GPA statistics endpoints.

use serde_json::Value;
use tracing::{debug, instrument};

use super::{Client, paged_form, timestamp_millis};
use crate::consts;
use crate::error::{Error, Result};
use crate::models::{Gpa, GpaQueryParams};
use crate::session::RequestOptions;

impl Client {
    /// The portal's default GPA query parameters.
    #[instrument(level = "debug", skip(self))]
    pub async fn default_gpa_query_params(&self) -> Result<GpaQueryParams> {
        let payload = match self.session().cache_value("gpa_params") {
            Some(cached) => cached,
            None => {
                let student_id = self.student_id().await?;
                let payload: Value = self
                    .session()
                    .get_with(
                        consts::GPA_PARAMS_URL,
                        RequestOptions {
                            query: vec![
                                ("_".to_owned(), timestamp_millis()),
                                ("su".to_owned(), student_id),
                            ],
                            ..RequestOptions::default()
                        },
                    )
                    .await?
                    .json()
                    .await?;
                self.session().store_value("gpa_params", payload.clone());
                payload
            }
        };
        GpaQueryParams::from_portal_defaults(&payload)
    }

    /// Runs a GPA calculation and returns the statistics.
    ///
    /// The portal computes server-side: the parameters are first posted to
    /// the calculation endpoint, then the result is queried with the same
    /// parameters.
    #[instrument(level = "debug", skip(self, params))]
    pub async fn gpa(&self, params: &GpaQueryParams) -> Result<Gpa> {
        let student_id = self.student_id().await?;
        let form = params.to_form();

        let calc_url = format!("{}{}", consts::GPA_CALC_URL, student_id);
        let verdict = self
            .session()
            .post(
                &calc_url,
                RequestOptions {
                    form: form.clone(),
                    ..RequestOptions::default()
                },
            )
            .await?
            .text()
            .await?;
        if verdict != "\"统计成功！\"" {
            if verdict.contains("统计失败") {
                return Err(Error::GpaCalculationFailed {
                    reason: "calculation failure".to_owned(),
                });
            }
            if verdict.contains("无功能权限") {
                return Err(Error::GpaCalculationFailed {
                    reason: "unauthorized".to_owned(),
                });
            }
            debug!(%verdict, "unrecognized calculation verdict, querying anyway");
        }

        let mut query = form;
        query.extend(paged_form(1, 15));
        // The query endpoint wants time=0 where the rest use time=1.
        if let Some(time) = query.iter_mut().find(|(k, _)| k == "time") {
            time.1 = "0".to_owned();
        }

        let query_url = format!("{}{}", consts::GPA_QUERY_URL, student_id);
        let payload: Value = self
            .session()
            .post(
                &query_url,
                RequestOptions {
                    form: query,
                    ..RequestOptions::default()
                },
            )
            .await?
            .json()
            .await?;

        let first = payload
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| Error::GpaCalculationFailed {
                reason: "empty result set".to_owned(),
            })?;
        Ok(serde_json::from_value(first)?)
    }
}
