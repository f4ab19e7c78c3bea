//! Course schedule records.

use serde::Deserialize;

use super::de;
use crate::parse::UnitSet;
use crate::results::{FilterValue, Filterable};

/// One course meeting on the weekly schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCourse {
    /// Course name.
    #[serde(rename = "kcmc")]
    pub name: String,
    /// Day of week, 1 = Monday.
    #[serde(rename = "xqj", deserialize_with = "de::flex_u16")]
    pub day: u16,
    /// Weeks the course meets.
    #[serde(rename = "zcd", deserialize_with = "de::weeks")]
    pub week: UnitSet,
    /// Class periods the course occupies.
    #[serde(rename = "jcs", deserialize_with = "de::periods")]
    pub time: UnitSet,
    #[serde(rename = "cdmc", default, deserialize_with = "de::opt_str")]
    pub location: Option<String>,
    #[serde(rename = "xf", default, deserialize_with = "de::opt_flex_f64")]
    pub credit: Option<f64>,
    /// Assessment method, e.g. exam or coursework.
    #[serde(rename = "khfsmc", default, deserialize_with = "de::opt_str")]
    pub assessment: Option<String>,
    #[serde(rename = "xkbz", default, deserialize_with = "de::opt_str")]
    pub remark: Option<String>,
    #[serde(rename = "xm", default, deserialize_with = "de::name_list")]
    pub teacher_name: Vec<String>,
    #[serde(rename = "zcmc", default, deserialize_with = "de::name_list")]
    pub teacher_title: Vec<String>,
    #[serde(rename = "kch_id")]
    pub course_id: String,
    #[serde(rename = "jxbmc")]
    pub class_name: String,
    #[serde(rename = "jxb_id")]
    pub class_id: String,
    #[serde(rename = "zxs", default, deserialize_with = "de::opt_flex_u32")]
    pub hour_total: Option<u32>,
    /// Hours per course component, e.g. lecture vs lab.
    #[serde(rename = "kcxszc", default, deserialize_with = "de::hour_details")]
    pub hour_remark: Option<Vec<(String, f64)>>,
    #[serde(rename = "zhxs", default, deserialize_with = "de::opt_flex_f64")]
    pub hour_week: Option<f64>,
    /// Professional field the course belongs to.
    #[serde(rename = "zyfxmc", default, deserialize_with = "de::opt_str")]
    pub field: Option<String>,
}

impl Filterable for ScheduleCourse {
    fn field_names() -> &'static [&'static str] {
        &[
            "name",
            "day",
            "week",
            "time",
            "location",
            "credit",
            "teacher_name",
            "course_id",
            "class_name",
            "class_id",
        ]
    }

    fn matches(&self, key: &str, value: &FilterValue) -> bool {
        match (key, value) {
            ("name", FilterValue::Text(t)) => self.name == *t,
            ("day", FilterValue::Units(u)) => u.contains(self.day),
            ("day", FilterValue::Number(n)) => f64::from(self.day) == *n,
            ("week", FilterValue::Units(u)) => self.week.overlaps(u),
            ("time", FilterValue::Units(u)) => self.time.overlaps(u),
            ("location", FilterValue::Text(t)) => self.location.as_deref() == Some(t),
            ("credit", FilterValue::Number(n)) => self.credit == Some(*n),
            ("teacher_name", FilterValue::Text(t)) => self.teacher_name.iter().any(|x| x == t),
            ("course_id", FilterValue::Text(t)) => self.course_id == *t,
            ("class_name", FilterValue::Text(t)) => self.class_name == *t,
            ("class_id", FilterValue::Text(t)) => self.class_id == *t,
            _ => false,
        }
    }
}
