//! Exam score records and their per-factor breakdown.

use serde::{Deserialize, Deserializer, de};

use super::de as de_helpers;
use crate::results::{FilterValue, Filterable};

/// One course score.
///
/// `score` stays a string: the portal reports both numeric marks and
/// grades like `优秀` or `P` in the same field.
#[derive(Debug, Clone, Deserialize)]
pub struct Score {
    #[serde(rename = "kcmc")]
    pub name: String,
    #[serde(rename = "jsxm", default, deserialize_with = "de_helpers::opt_str")]
    pub teacher: Option<String>,
    #[serde(rename = "cj")]
    pub score: String,
    #[serde(rename = "xf", deserialize_with = "de_helpers::flex_f64")]
    pub credit: f64,
    /// Grade point; absent for ungraded courses.
    #[serde(rename = "jd", default, deserialize_with = "de_helpers::opt_flex_f64")]
    pub gp: Option<f64>,
    /// Whether the score was voided, e.g. for academic misconduct.
    #[serde(rename = "cjsfzf", default, deserialize_with = "de_helpers::chinese_bool")]
    pub invalid: bool,
    #[serde(rename = "kcbj", default, deserialize_with = "de_helpers::opt_str")]
    pub course_type: Option<String>,
    #[serde(rename = "kclbmc", default, deserialize_with = "de_helpers::opt_str")]
    pub category: Option<String>,
    /// Examination nature, e.g. normal or makeup.
    #[serde(rename = "ksxz", default, deserialize_with = "de_helpers::opt_str")]
    pub score_type: Option<String>,
    #[serde(rename = "khfsmc", default, deserialize_with = "de_helpers::opt_str")]
    pub method: Option<String>,
    #[serde(rename = "kch_id", default, deserialize_with = "de_helpers::opt_str")]
    pub course_id: Option<String>,
    #[serde(rename = "jxbmc", default, deserialize_with = "de_helpers::opt_str")]
    pub class_name: Option<String>,
    #[serde(rename = "jxb_id", default, deserialize_with = "de_helpers::opt_str")]
    pub class_id: Option<String>,
}

impl Filterable for Score {
    fn field_names() -> &'static [&'static str] {
        &[
            "name",
            "teacher",
            "score",
            "credit",
            "gp",
            "invalid",
            "course_type",
            "category",
            "course_id",
            "class_name",
            "class_id",
        ]
    }

    fn matches(&self, key: &str, value: &FilterValue) -> bool {
        match (key, value) {
            ("name", FilterValue::Text(t)) => self.name == *t,
            ("teacher", FilterValue::Text(t)) => self.teacher.as_deref() == Some(t),
            ("score", FilterValue::Text(t)) => self.score == *t,
            ("credit", FilterValue::Number(n)) => self.credit == *n,
            ("gp", FilterValue::Number(n)) => self.gp == Some(*n),
            ("invalid", FilterValue::Flag(b)) => self.invalid == *b,
            ("course_type", FilterValue::Text(t)) => self.course_type.as_deref() == Some(t),
            ("category", FilterValue::Text(t)) => self.category.as_deref() == Some(t),
            ("course_id", FilterValue::Text(t)) => self.course_id.as_deref() == Some(t),
            ("class_name", FilterValue::Text(t)) => self.class_name.as_deref() == Some(t),
            ("class_id", FilterValue::Text(t)) => self.class_id.as_deref() == Some(t),
            _ => false,
        }
    }
}

/// One component of a score, e.g. `平时(40%)` worth 92 points.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFactor {
    pub name: String,
    /// Weight of this factor, as a fraction.
    pub percentage: f64,
    pub score: String,
}

impl<'de> Deserialize<'de> for ScoreFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            xmblmc: String,
            xmcj: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        // "平时(40%)" carries both the name and the weight
        let open = raw
            .xmblmc
            .find('(')
            .ok_or_else(|| de::Error::custom(format!("malformed factor name: `{}`", raw.xmblmc)))?;
        let percent = raw.xmblmc[open + 1..]
            .strip_suffix("%)")
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(|| de::Error::custom(format!("malformed factor name: `{}`", raw.xmblmc)))?;

        Ok(Self {
            name: raw.xmblmc[..open].to_owned(),
            percentage: percent / 100.0,
            score: raw.xmcj,
        })
    }
}
