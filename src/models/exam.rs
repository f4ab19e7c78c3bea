//! Exam arrangement records.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, de};

use super::de as de_helpers;
use crate::results::{FilterValue, Filterable};

/// One scheduled exam.
#[derive(Debug, Clone, Deserialize)]
pub struct Exam {
    /// Examination name, e.g. `2023-2024-1学期期末考试`.
    #[serde(rename = "ksmc")]
    pub name: String,
    #[serde(rename = "cdmc", default, deserialize_with = "de_helpers::opt_str")]
    pub location: Option<String>,
    #[serde(rename = "zwh", default, deserialize_with = "de_helpers::opt_flex_u32")]
    pub seat: Option<u32>,
    #[serde(rename = "kch", default, deserialize_with = "de_helpers::opt_str")]
    pub course_id: Option<String>,
    #[serde(rename = "kcmc", default, deserialize_with = "de_helpers::opt_str")]
    pub course_name: Option<String>,
    #[serde(rename = "jxbmc", default, deserialize_with = "de_helpers::opt_str")]
    pub class_name: Option<String>,
    /// Whether this is a rebuild (retake) exam.
    #[serde(rename = "cxbj", default, deserialize_with = "de_helpers::chinese_bool")]
    pub rebuild: bool,
    #[serde(rename = "xf", default, deserialize_with = "de_helpers::opt_flex_f64")]
    pub credit: Option<f64>,
    #[serde(rename = "zxbj", default, deserialize_with = "de_helpers::chinese_bool")]
    pub self_study: bool,
    /// Exam slot, from `kssj` strings like `2023-12-28(08:00-10:00)`.
    #[serde(rename = "kssj", default, deserialize_with = "exam_slot")]
    pub slot: Option<ExamSlot>,
}

/// Date and time span of an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

fn exam_slot<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ExamSlot>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_exam_slot(&raw)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("malformed exam time: `{raw}`")))
}

fn parse_exam_slot(raw: &str) -> Option<ExamSlot> {
    let open = raw.find('(')?;
    let date = NaiveDate::parse_from_str(&raw[..open], "%Y-%m-%d").ok()?;
    let (start, end) = raw[open + 1..].strip_suffix(')')?.split_once('-')?;
    Some(ExamSlot {
        date,
        start: NaiveTime::parse_from_str(start, "%H:%M").ok()?,
        end: NaiveTime::parse_from_str(end, "%H:%M").ok()?,
    })
}

impl Filterable for Exam {
    fn field_names() -> &'static [&'static str] {
        &[
            "name",
            "location",
            "course_id",
            "course_name",
            "class_name",
            "rebuild",
        ]
    }

    fn matches(&self, key: &str, value: &FilterValue) -> bool {
        match (key, value) {
            ("name", FilterValue::Text(t)) => self.name == *t,
            ("location", FilterValue::Text(t)) => self.location.as_deref() == Some(t),
            ("course_id", FilterValue::Text(t)) => self.course_id.as_deref() == Some(t),
            ("course_name", FilterValue::Text(t)) => self.course_name.as_deref() == Some(t),
            ("class_name", FilterValue::Text(t)) => self.class_name.as_deref() == Some(t),
            ("rebuild", FilterValue::Flag(b)) => self.rebuild == *b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_exam_with_slot() {
        let exam: Exam = serde_json::from_value(serde_json::json!({
            "ksmc": "2023-2024-1期末考试",
            "cdmc": "上院100",
            "zwh": "23",
            "kch": "MA001",
            "kcmc": "高等数学",
            "cxbj": "否",
            "xf": "4.0",
            "kssj": "2023-12-28(08:00-10:00)"
        }))
        .unwrap();
        let slot = exam.slot.unwrap();
        assert_eq!(slot.date, NaiveDate::from_ymd_opt(2023, 12, 28).unwrap());
        assert_eq!(slot.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(slot.end, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(exam.seat, Some(23));
        assert!(!exam.rebuild);
    }

    #[test]
    fn missing_slot_is_none() {
        let exam: Exam = serde_json::from_value(serde_json::json!({
            "ksmc": "补考",
            "kssj": ""
        }))
        .unwrap();
        assert!(exam.slot.is_none());
    }

    #[test]
    fn malformed_slot_is_an_error() {
        let result: Result<Exam, _> = serde_json::from_value(serde_json::json!({
            "ksmc": "x",
            "kssj": "sometime next week"
        }));
        assert!(result.is_err());
    }
}
