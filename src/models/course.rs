//! Course library records, from the all-of-campus course catalogue.

use serde::Deserialize;

use super::de;
use crate::parse::UnitSet;
use crate::results::{FilterValue, Filterable};

/// One course offering in the course library.
#[derive(Debug, Clone, Deserialize)]
pub struct LibCourse {
    #[serde(rename = "kcmc")]
    pub name: String,
    /// Day of week, 1 = Monday.
    #[serde(rename = "xqj", deserialize_with = "de::flex_u16")]
    pub day: u16,
    #[serde(rename = "qsjsz", deserialize_with = "de::weeks")]
    pub week: UnitSet,
    #[serde(rename = "skjc", deserialize_with = "de::periods")]
    pub time: UnitSet,
    #[serde(rename = "cdmc", default, deserialize_with = "de::opt_str")]
    pub location: Option<String>,
    /// All teaching locations, when the class moves around.
    #[serde(rename = "jxdd", default, deserialize_with = "de::name_list")]
    pub locations: Vec<String>,
    /// Offering faculty.
    #[serde(rename = "kkxy", default, deserialize_with = "de::opt_str")]
    pub faculty: Option<String>,
    #[serde(rename = "xf", default, deserialize_with = "de::opt_flex_f64")]
    pub credit: Option<f64>,
    #[serde(rename = "zjs", default, deserialize_with = "de::name_list")]
    pub teacher: Vec<String>,
    #[serde(rename = "kch", default, deserialize_with = "de::opt_str")]
    pub course_id: Option<String>,
    #[serde(rename = "jxbmc", default, deserialize_with = "de::opt_str")]
    pub class_name: Option<String>,
    #[serde(rename = "jxb_id", default, deserialize_with = "de::opt_str")]
    pub class_id: Option<String>,
    /// Class composition, e.g. the admin classes attending.
    #[serde(rename = "jxbzc", default, deserialize_with = "de::name_list")]
    pub class_composition: Vec<String>,
    #[serde(rename = "rwzxs", default, deserialize_with = "de::opt_flex_u32")]
    pub hour_total: Option<u32>,
    #[serde(rename = "zws", default, deserialize_with = "de::opt_flex_u32")]
    pub seats: Option<u32>,
    #[serde(rename = "xkrs", default, deserialize_with = "de::opt_flex_u32")]
    pub students_elected: Option<u32>,
    #[serde(rename = "jxbrs", default, deserialize_with = "de::opt_flex_u32")]
    pub students_planned: Option<u32>,
}

impl Filterable for LibCourse {
    fn field_names() -> &'static [&'static str] {
        &[
            "name",
            "day",
            "week",
            "time",
            "location",
            "faculty",
            "credit",
            "teacher",
            "course_id",
            "class_name",
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
            ("faculty", FilterValue::Text(t)) => self.faculty.as_deref() == Some(t),
            ("credit", FilterValue::Number(n)) => self.credit == Some(*n),
            ("teacher", FilterValue::Text(t)) => self.teacher.iter().any(|x| x == t),
            ("course_id", FilterValue::Text(t)) => self.course_id.as_deref() == Some(t),
            ("class_name", FilterValue::Text(t)) => self.class_name.as_deref() == Some(t),
            _ => false,
        }
    }
}
