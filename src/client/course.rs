//! Course library queries.

use std::sync::Arc;

use tracing::instrument;

use super::{Client, PortalPageFetcher, term_code};
use crate::consts;
use crate::error::Result;
use crate::models::LibCourse;
use crate::parse::format_ranges;
use crate::query::{DEFAULT_PAGE_SIZE, QueryResult};

/// Search criteria for [`Client::query_courses`]. Empty fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    /// Course name, may be fuzzy.
    pub name: Option<String>,
    pub teacher: Option<String>,
    /// Days of week to match, 1 = Monday.
    pub day_of_week: Vec<u16>,
    pub week: Vec<u16>,
    /// Class periods to match.
    pub time_of_day: Vec<u16>,
}

impl Client {
    /// Queries the campus-wide course library.
    ///
    /// The result set can be large, so it is returned as a lazy
    /// [`QueryResult`] that fetches pages on demand.
    #[instrument(level = "debug", skip(self))]
    pub async fn query_courses(
        &self,
        year: u16,
        term: u8,
        filter: CourseFilter,
    ) -> Result<QueryResult<LibCourse>> {
        self.query_courses_paged(year, term, filter, DEFAULT_PAGE_SIZE)
            .await
    }

    /// [`query_courses`](Self::query_courses) with an explicit page size.
    pub async fn query_courses_paged(
        &self,
        year: u16,
        term: u8,
        filter: CourseFilter,
        page_size: usize,
    ) -> Result<QueryResult<LibCourse>> {
        let student_id = self.student_id().await?;
        let params = vec![
            ("xnm".to_owned(), year.to_string()),
            ("xqm".to_owned(), term_code(term)?.to_string()),
            ("kch_id".to_owned(), filter.name.unwrap_or_default()),
            ("jqh_id".to_owned(), filter.teacher.unwrap_or_default()),
            ("xqj".to_owned(), format_ranges(&filter.day_of_week)),
            ("qsjsz".to_owned(), format_ranges(&filter.week)),
            ("skjc".to_owned(), format_ranges(&filter.time_of_day)),
        ];

        let url = format!("{}{}", consts::COURSELIB_URL, student_id);
        let fetcher = PortalPageFetcher::new(Arc::clone(self.session()), url, params);
        Ok(QueryResult::with_page_size(Box::new(fetcher), page_size))
    }
}
