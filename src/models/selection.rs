//! Course selection data structures and page parsers.
//!
//! The selection pages are server-rendered HTML with the query state in
//! hidden `<input>` fields; the class lists behind them are JSON. Both
//! halves are modeled here, with the stateful selection flow built on top
//! in the client layer.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use super::de;
use crate::error::{Error, Result};
use crate::parse::{UnitSet, parse_periods, parse_weeks};

fn hidden_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"id="(?P<k>.*?)" value="(?P<v>.*?)"/>"#).unwrap_or_else(|_| unreachable!())
    })
}

fn sector_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"queryCourse\(this,'(?P<kklxdm>\d*)','(?P<xkkz_id>.*?)'.*>(?P<name>.*)</a>")
            .unwrap_or_else(|_| unreachable!())
    })
}

/// Extracts the hidden `<input>` fields of a selection page.
#[must_use]
pub fn parse_hidden_fields(html: &str) -> HashMap<String, String> {
    hidden_field_re()
        .captures_iter(html)
        .map(|caps| (caps["k"].to_owned(), caps["v"].to_owned()))
        .collect()
}

/// Extracts the sector tabs: `(course type code, xkkz_id, display name)`.
#[must_use]
pub fn parse_sector_links(html: &str) -> Vec<(String, String, String)> {
    sector_link_re()
        .captures_iter(html)
        .map(|caps| {
            (
                caps["kklxdm"].to_owned(),
                caps["xkkz_id"].to_owned(),
                caps["name"].to_owned(),
            )
        })
        .collect()
}

fn require(fields: &HashMap<String, String>, key: &'static str) -> Result<String> {
    fields
        .get(key)
        .cloned()
        .ok_or_else(|| Error::parse(key, "<missing hidden field>"))
}

fn require_num(fields: &HashMap<String, String>, key: &'static str) -> Result<i64> {
    let raw = require(fields, key)?;
    raw.trim().parse().map_err(|_| Error::parse(key, raw))
}

/// Parameters shared by every sector in the current selection round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSharedInfo {
    /// Current term id when querying.
    pub term: String,
    /// Academic year of the selection round.
    pub selection_year: i64,
    /// Term code of the selection round.
    pub selection_term: i64,
    pub major_id: String,
    /// Year of enrollment.
    pub student_grade: i64,
    /// Administrative class id.
    pub natural_class_id: String,
    pub self_selecting_status: i64,
    pub ccdm: String,
    pub student_type_code: String,
    pub gender: String,
    pub field_id: String,
    pub student_background: String,
}

impl SelectionSharedInfo {
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            term: require(fields, "xqh_id")?,
            selection_year: require_num(fields, "xkxnm")?,
            selection_term: require_num(fields, "xkxqm")?,
            major_id: require(fields, "zyh_id")?,
            student_grade: require_num(fields, "njdm_id")?,
            natural_class_id: require(fields, "bh_id")?,
            self_selecting_status: require_num(fields, "xszxzt")?,
            ccdm: require(fields, "ccdm")?,
            student_type_code: require(fields, "xslbdm")?,
            gender: require(fields, "xbm")?,
            field_id: require(fields, "zyfx_id")?,
            student_background: require(fields, "xsbj")?,
        })
    }

    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        vec![
            ("xqh_id".to_owned(), self.term.clone()),
            ("xkxnm".to_owned(), self.selection_year.to_string()),
            ("xkxqm".to_owned(), self.selection_term.to_string()),
            ("zyh_id".to_owned(), self.major_id.clone()),
            ("njdm_id".to_owned(), self.student_grade.to_string()),
            ("bh_id".to_owned(), self.natural_class_id.clone()),
            ("xszxzt".to_owned(), self.self_selecting_status.to_string()),
            ("ccdm".to_owned(), self.ccdm.clone()),
            ("xslbdm".to_owned(), self.student_type_code.clone()),
            ("xbm".to_owned(), self.gender.clone()),
            ("zyfx_id".to_owned(), self.field_id.clone()),
            ("xsbj".to_owned(), self.student_background.clone()),
        ]
    }
}

/// Per-sector query parameters from a sector's hidden fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorParams {
    pub task_type: i64,
    pub xkly: i64,
    /// Parameter updated by PE course operations.
    pub pe_op_param: i64,
    pub sector_type_id: String,
    /// Used when deregistering.
    pub txbsfrl: i64,
    pub kkbk: i64,
}

impl SectorParams {
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            task_type: require_num(fields, "rwlx")?,
            xkly: require_num(fields, "xkly")?,
            pe_op_param: require_num(fields, "tykczgxdcs")?,
            sector_type_id: require(fields, "bklx_id")?,
            txbsfrl: require_num(fields, "txbsfrl")?,
            kkbk: require_num(fields, "kkbk")?,
        })
    }

    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        vec![
            ("rwlx".to_owned(), self.task_type.to_string()),
            ("xkly".to_owned(), self.xkly.to_string()),
            ("tykczgxdcs".to_owned(), self.pe_op_param.to_string()),
            ("bklx_id".to_owned(), self.sector_type_id.clone()),
            ("txbsfrl".to_owned(), self.txbsfrl.to_string()),
            ("kkbk".to_owned(), self.kkbk.to_string()),
        ]
    }
}

/// One selectable course in a sector's course list.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionCourse {
    #[serde(rename = "kcmc")]
    pub name: String,
    #[serde(rename = "xf", deserialize_with = "de::flex_f64")]
    pub credit: f64,
    /// Public course id, e.g. `CS1501`.
    #[serde(rename = "kch")]
    pub course_id: String,
    /// Internal course id used by the selection endpoints.
    #[serde(rename = "kch_id")]
    pub internal_course_id: String,
    #[serde(rename = "jxbmc")]
    pub class_name: String,
    #[serde(rename = "jxb_id")]
    pub class_id: String,
    #[serde(rename = "yxzrs", default, deserialize_with = "de::opt_flex_u32")]
    pub students_registered: Option<u32>,
}

/// A teacher as listed on a selection class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub name: String,
    pub title: Option<String>,
}

/// One meeting slot of a selection class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSlot {
    /// Day of week, 1 = Monday.
    pub day: u16,
    pub periods: UnitSet,
    pub weeks: UnitSet,
}

/// The expensive half of a selection class, fetched on first access.
#[derive(Debug, Clone)]
pub struct ClassDetail {
    /// Opaque id the register/deregister endpoints require.
    pub register_id: String,
    pub teachers: Vec<Teacher>,
    pub locations: Vec<String>,
    pub time: Vec<LessonSlot>,
    pub course_type: Vec<String>,
    pub remark: Option<String>,
    pub students_planned: Option<u32>,
}

/// Raw class record from the class-list endpoint, keyed by `jxb_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSelectionClass {
    #[serde(rename = "jxb_id")]
    pub class_id: String,
    #[serde(rename = "do_jxb_id")]
    pub register_id: String,
    #[serde(rename = "jsxx", default, deserialize_with = "teachers")]
    pub teachers: Vec<Teacher>,
    #[serde(rename = "jxdd", default, deserialize_with = "de::name_list")]
    pub locations: Vec<String>,
    #[serde(rename = "sksj", default, deserialize_with = "lesson_time")]
    pub time: Vec<LessonSlot>,
    #[serde(rename = "kcxzmc", default, deserialize_with = "de::name_list")]
    pub course_type: Vec<String>,
    #[serde(rename = "xkbz", default, deserialize_with = "de::opt_str")]
    pub remark: Option<String>,
    #[serde(rename = "jxbrs", default, deserialize_with = "de::opt_flex_u32")]
    pub students_planned: Option<u32>,
}

impl From<RawSelectionClass> for ClassDetail {
    fn from(raw: RawSelectionClass) -> Self {
        Self {
            register_id: raw.register_id,
            teachers: raw.teachers,
            locations: raw.locations,
            time: raw.time,
            course_type: raw.course_type,
            remark: raw.remark,
            students_planned: raw.students_planned,
        }
    }
}

/// `jsxx` is `;`-separated `code/name/title` triples.
fn teachers<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Teacher>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('/').collect();
            match parts.as_slice() {
                [_, name, title, ..] => Teacher {
                    name: (*name).to_owned(),
                    title: Some((*title).to_owned()),
                },
                [name, title] => Teacher {
                    name: (*name).to_owned(),
                    title: Some((*title).to_owned()),
                },
                _ => Teacher {
                    name: entry.to_owned(),
                    title: None,
                },
            }
        })
        .collect())
}

/// `sksj` is `;`-separated `星期X第a-b节{weeks}` slots.
fn lesson_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<LessonSlot>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    parse_lesson_time(&raw).map_err(serde::de::Error::custom)
}

/// Parses a `sksj` display string like `星期四第3-4节{1-16周}`.
///
/// Slots are separated by semicolons only; a comma inside the braces
/// belongs to the week list (`{3-4周,7-8周}`).
pub fn parse_lesson_time(raw: &str) -> Result<Vec<LessonSlot>> {
    raw.split([';', '；'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|slot| parse_lesson_slot(slot).ok_or_else(|| Error::parse("sksj", raw)))
        .collect()
}

fn parse_lesson_slot(slot: &str) -> Option<LessonSlot> {
    let rest = slot.strip_prefix("星期")?;
    let day_char = rest.chars().next()?;
    let day = match day_char {
        '一' => 1,
        '二' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '日' | '天' => 7,
        _ => return None,
    };
    let rest = rest.strip_prefix(day_char)?.strip_prefix('第')?;
    let brace = rest.find('{')?;
    let periods = parse_periods(&rest[..brace]).ok()?;
    let weeks = parse_weeks(rest[brace + 1..].strip_suffix('}')?).ok()?;
    Some(LessonSlot { day, periods, weeks })
}
