//! Course selection flow.
//!
//! Selection is stateful on the server: a round exposes several sectors
//! (course categories), each listing selectable courses, each of which is
//! offered by one or more teaching classes. The class list is cheap; the
//! per-class detail needed for registration is a second request, so
//! [`SelectionClass`] carries it as a [`Deferred`] resolved on first use.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use super::Client;
use crate::consts;
use crate::error::{Error, Result};
use crate::lazy::Deferred;
use crate::models::selection::{
    ClassDetail, RawSelectionClass, SectorParams, SelectionCourse, SelectionSharedInfo,
    parse_hidden_fields, parse_sector_links,
};
use crate::session::{RequestOptions, Session};

const NOT_IN_SELECTION_MARKER: &str = "对不起，当前不属于选课阶段";
const TIME_CONFLICT_MESSAGE: &str = "所选教学班的上课时间与其他教学班有冲突！";

/// One course sector of the current selection round.
pub struct SelectionSector {
    session: Arc<Session>,
    student_id: String,
    /// Display name, e.g. 主修课程.
    pub name: String,
    /// Wire code (`kklxdm`) of the sector's course type.
    pub course_type_code: String,
    /// Opaque round id the sector's endpoints require.
    pub xkkz_id: String,
    pub params: SectorParams,
    pub shared: Arc<SelectionSharedInfo>,
}

impl fmt::Debug for SelectionSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionSector")
            .field("name", &self.name)
            .field("course_type_code", &self.course_type_code)
            .field("xkkz_id", &self.xkkz_id)
            .finish_non_exhaustive()
    }
}

impl SelectionSector {
    /// Form fields identifying this sector, shared by its query endpoints.
    fn form(&self) -> Vec<(String, String)> {
        let mut form = self.params.to_form();
        form.extend(self.shared.to_form());
        form.push(("kklxdm".to_owned(), self.course_type_code.clone()));
        form
    }

    /// Lists every selectable class in this sector.
    #[instrument(level = "debug", skip(self), fields(sector = %self.name))]
    pub async fn classes(self: &Arc<Self>) -> Result<Vec<SelectionClass>> {
        let mut form = self.form();
        form.push(("kspage".to_owned(), "1".to_owned()));
        form.push(("jspage".to_owned(), "5000".to_owned()));

        let url = format!("{}{}", consts::SELECTION_QUERY_COURSES, self.student_id);
        let payload: Value = self
            .session
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
            .get("tmpList")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let courses: Vec<SelectionCourse> = raw
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<_, _>>()?;

        debug!(count = courses.len(), "listed selection classes");
        Ok(courses
            .into_iter()
            .map(|course| SelectionClass::new(course, Arc::clone(self)))
            .collect())
    }

    /// Fetches the detail records of every class offering `course_id`.
    async fn fetch_class_details(&self, course_id: &str) -> Result<Vec<RawSelectionClass>> {
        let mut form = self.form();
        form.push(("kch_id".to_owned(), course_id.to_owned()));

        let url = format!("{}{}", consts::SELECTION_QUERY_CLASSES, self.student_id);
        let payload: Value = self
            .session
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
        Ok(serde_json::from_value(payload)?)
    }
}

/// One selectable teaching class.
///
/// The cheap listing fields are available immediately; everything behind
/// [`detail`](Self::detail) is fetched lazily, at most once.
pub struct SelectionClass {
    pub info: SelectionCourse,
    pub sector: Arc<SelectionSector>,
    detail: Deferred<ClassDetail>,
}

impl fmt::Debug for SelectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionClass")
            .field("name", &self.info.name)
            .field("class_name", &self.info.class_name)
            .field("detail", &self.detail)
            .finish_non_exhaustive()
    }
}

impl SelectionClass {
    fn new(info: SelectionCourse, sector: Arc<SelectionSector>) -> Self {
        let loader_sector = Arc::clone(&sector);
        let course_id = info.internal_course_id.clone();
        let class_id = info.class_id.clone();
        let detail = Deferred::new(move || {
            let sector = Arc::clone(&loader_sector);
            let course_id = course_id.clone();
            let class_id = class_id.clone();
            Box::pin(async move {
                let details = sector.fetch_class_details(&course_id).await?;
                details
                    .into_iter()
                    .find(|raw| raw.class_id == class_id)
                    .map(ClassDetail::from)
                    .ok_or(Error::ClassFetchFailed { class_id })
            })
        });
        Self {
            info,
            sector,
            detail,
        }
    }

    /// The class's full record, fetching it on first access.
    pub async fn detail(&self) -> Result<&ClassDetail> {
        self.detail.get().await
    }

    /// Whether the detail half has been fetched already.
    #[must_use]
    pub fn is_detail_resolved(&self) -> bool {
        self.detail.is_resolved()
    }

    /// Whether this class is currently registered for.
    pub async fn is_registered(&self) -> Result<bool> {
        let detail = self.detail().await?;
        let form = vec![
            ("jxb_id".to_owned(), detail.register_id.clone()),
            ("xkkz_id".to_owned(), self.sector.xkkz_id.clone()),
            ("xnm".to_owned(), self.sector.shared.selection_year.to_string()),
            ("xqm".to_owned(), self.sector.shared.selection_term.to_string()),
        ];

        let url = format!(
            "{}{}",
            consts::SELECTION_IS_REGISTERED,
            self.sector.student_id
        );
        let verdict: Value = self
            .sector
            .session
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
        Ok(verdict.as_str() == Some("1"))
    }

    /// Registers for this class.
    #[instrument(level = "info", skip(self), fields(class = %self.info.class_name))]
    pub async fn register(&self) -> Result<()> {
        let detail = self.detail().await?;
        let form = vec![
            ("jxb_ids".to_owned(), detail.register_id.clone()),
            ("kch_id".to_owned(), self.info.internal_course_id.clone()),
            ("qz".to_owned(), "0".to_owned()),
        ];

        let url = format!("{}{}", consts::SELECTION_REGISTER, self.sector.student_id);
        let verdict: Value = self
            .sector
            .session
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

        match verdict.get("flag").and_then(Value::as_str) {
            Some("1") => {
                info!("registered");
                Ok(())
            }
            Some("-1") => Err(Error::FullCapacity),
            Some("0") => match verdict.get("msg").and_then(Value::as_str) {
                Some(TIME_CONFLICT_MESSAGE) => Err(Error::TimeConflict),
                Some(msg) => Err(Error::Registration {
                    reason: msg.to_owned(),
                }),
                None => Err(Error::Registration {
                    reason: "unknown error".to_owned(),
                }),
            },
            _ => Err(Error::Registration {
                reason: format!("unexpected response: {verdict}"),
            }),
        }
    }

    /// Deregisters from this class.
    #[instrument(level = "info", skip(self), fields(class = %self.info.class_name))]
    pub async fn deregister(&self) -> Result<()> {
        let detail = self.detail().await?;
        let form = vec![
            ("kch_id".to_owned(), self.info.internal_course_id.clone()),
            ("jxb_ids".to_owned(), detail.register_id.clone()),
        ];

        let url = format!("{}{}", consts::SELECTION_DEREGISTER, self.sector.student_id);
        let verdict: Value = self
            .sector
            .session
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

        let reason = match verdict.as_str() {
            Some("1") => {
                info!("deregistered");
                return Ok(());
            }
            Some("2") => "server busy",
            Some("3") => "unknown error",
            Some("4") => "illegal access",
            Some("5") => "validation failure",
            _ => {
                return Err(Error::Deregistration {
                    reason: format!("unexpected response: {verdict}"),
                });
            }
        };
        Err(Error::Deregistration {
            reason: reason.to_owned(),
        })
    }
}

impl Client {
    /// The sectors of the current selection round.
    ///
    /// Errors with [`Error::SelectionNotAvailable`] outside a selection
    /// phase.
    #[instrument(level = "debug", skip(self))]
    pub async fn course_selection_sectors(&self) -> Result<Vec<Arc<SelectionSector>>> {
        let student_id = self.student_id().await?;
        let url = format!("{}{}", consts::SELECTION_ALL_SECTORS_PARAM_URL, student_id);
        let index = self.session().get(&url).await?.text().await?;
        if index.contains(NOT_IN_SELECTION_MARKER) {
            return Err(Error::SelectionNotAvailable);
        }

        let shared = Arc::new(SelectionSharedInfo::from_fields(&parse_hidden_fields(
            &index,
        ))?);

        let mut sectors = Vec::new();
        for (course_type_code, xkkz_id, name) in parse_sector_links(&index) {
            let form = vec![
                ("xkkz_id".to_owned(), xkkz_id.clone()),
                ("xszxzt".to_owned(), shared.self_selecting_status.to_string()),
                ("kspage".to_owned(), "0".to_owned()),
                ("jspage".to_owned(), "0".to_owned()),
            ];
            let sector_url = format!("{}{}", consts::SELECTION_SECTOR_PARAM_URL, student_id);
            let page = self
                .session()
                .post(
                    &sector_url,
                    RequestOptions {
                        form,
                        ..RequestOptions::default()
                    },
                )
                .await?
                .text()
                .await?;
            let params = SectorParams::from_fields(&parse_hidden_fields(&page))?;

            sectors.push(Arc::new(SelectionSector {
                session: Arc::clone(self.session()),
                student_id: student_id.clone(),
                name,
                course_type_code,
                xkkz_id,
                params,
                shared: Arc::clone(&shared),
            }));
        }
        debug!(count = sectors.len(), "discovered selection sectors");
        Ok(sectors)
    }
}
