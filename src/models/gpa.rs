//! GPA query parameters and results.
//!
//! The GPA endpoint is a two-step dance: the query parameters are first
//! posted to a calculation endpoint, then the same parameters (plus
//! pagination fields) are posted to the query endpoint for the result.
//! The defaults are served by the portal itself as a list of
//! `{zdm, szz}` field descriptors.

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::parse;

/// How multiple ranking conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

/// Which courses count towards the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseRange {
    All,
    #[default]
    Core,
}

impl CourseRange {
    fn code(self) -> &'static str {
        match self {
            Self::All => "qbkc",
            Self::Core => "hxkc",
        }
    }
}

/// Which students to rank against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ranking {
    /// Students of the same grade and professional field.
    #[default]
    GradeAndField,
}

impl Ranking {
    fn code(self) -> &'static str {
        match self {
            Self::GradeAndField => "njzy",
        }
    }
}

/// Parameters for a GPA calculation.
///
/// Fetch the portal's defaults via
/// [`Client::default_gpa_query_params`](crate::client::Client::default_gpa_query_params)
/// and tweak from there.
#[derive(Debug, Clone, Default)]
pub struct GpaQueryParams {
    /// First term to include, as a term code; `None` means unbounded.
    pub start_term: Option<i64>,
    /// Last term to include; `None` means unbounded.
    pub end_term: Option<i64>,
    pub condition_logic: ConditionLogic,
    /// Count makeup exam passes as a 60.
    pub makeup_as_60: bool,
    /// Count rebuilt course passes as a 60.
    pub rebuild_as_60: bool,
    /// Decimal places of the computed grade point.
    pub gp_round: u32,
    /// Decimal places of the computed GPA.
    pub gpa_round: u32,
    /// Score types excluded from grade point statistics.
    pub exclude_gp: String,
    /// Score types excluded from GPA statistics.
    pub exclude_gpa: String,
    /// Course ids always included in the statistics.
    pub course_whole: Vec<String>,
    pub course_range: CourseRange,
    pub ranking: Ranking,
    /// Restrict to students with/without a student roll.
    pub has_roll: Option<bool>,
    /// Restrict to students registered/unregistered this term.
    pub registered: Option<bool>,
    /// Restrict to students currently attending or not.
    pub attending: Option<bool>,
}

fn flag_from_codes(raw: &str, truthy: &str, falsy: &str) -> Option<bool> {
    let codes: Vec<&str> = raw.split(',').collect();
    if codes.contains(&truthy) {
        Some(true)
    } else if codes.contains(&falsy) {
        Some(false)
    } else {
        None
    }
}

impl GpaQueryParams {
    /// Builds the default parameters from the portal's field-descriptor
    /// payload (a JSON array of `{zdm, szz}` objects).
    pub fn from_portal_defaults(payload: &Value) -> Result<Self> {
        let items = payload
            .as_array()
            .ok_or_else(|| Error::parse("gpa_params", payload.to_string()))?;

        let field = |name: &str| -> Option<String> {
            items.iter().find_map(|item| {
                (item.get("zdm")?.as_str()? == name)
                    .then(|| item.get("szz")?.as_str().map(str::to_owned))
                    .flatten()
            })
        };

        let status = field("atjc").unwrap_or_default();
        Ok(Self {
            gp_round: field("cjblws")
                .map(|v| parse::parse_number("cjblws", &v))
                .transpose()?
                .unwrap_or(1),
            gpa_round: field("jdblws")
                .map(|v| parse::parse_number("jdblws", &v))
                .transpose()?
                .unwrap_or(2),
            exclude_gp: field("bjjd").unwrap_or_default(),
            exclude_gpa: field("bjpjf").unwrap_or_default(),
            course_whole: field("tjqckc")
                .map(|v| parse::split_list(&v))
                .unwrap_or_default(),
            has_roll: flag_from_codes(&status, "1", "2"),
            registered: flag_from_codes(&status, "3", "4"),
            attending: flag_from_codes(&status, "5", "6"),
            ..Self::default()
        })
    }

    /// Serializes into the form fields both GPA endpoints expect.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let opt_term = |t: Option<i64>| t.map(|v| v.to_string()).unwrap_or_default();
        let mut form = vec![
            ("qsXnxq".to_owned(), opt_term(self.start_term)),
            ("zzXnxq".to_owned(), opt_term(self.end_term)),
            (
                "tjgx".to_owned(),
                match self.condition_logic {
                    ConditionLogic::And => "0",
                    ConditionLogic::Or => "1",
                }
                .to_owned(),
            ),
            (
                "alsfj".to_owned(),
                format!(
                    "{}{}",
                    if self.makeup_as_60 { "bk" } else { "" },
                    if self.rebuild_as_60 { "cx" } else { "" }
                ),
            ),
            ("sspjfblws".to_owned(), self.gp_round.to_string()),
            ("pjjdblws".to_owned(), self.gpa_round.to_string()),
            ("bjjd".to_owned(), self.exclude_gp.clone()),
            ("bjpjf".to_owned(), self.exclude_gpa.clone()),
            ("kch_ids".to_owned(), self.course_whole.join(",")),
            ("kcfw".to_owned(), self.course_range.code().to_owned()),
            ("tjfw".to_owned(), self.ranking.code().to_owned()),
        ];
        for (key, flag) in [
            ("xjzt", self.has_roll),
            ("zczt", self.registered),
            ("sfzx", self.attending),
        ] {
            if let Some(flag) = flag {
                form.push((key.to_owned(), if flag { "1" } else { "0" }.to_owned()));
            }
        }
        form
    }
}

/// The computed GPA statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Gpa {
    pub total_score: f64,
    pub course_count: u32,
    pub fail_count: u32,
    pub total_credit: f64,
    pub acquired_credit: f64,
    pub failed_credit: f64,
    /// Pass rate as a fraction.
    pub pass_rate: f64,
    /// Grade point total.
    pub gp: f64,
    pub gp_ranking: u32,
    pub gpa: f64,
    pub gpa_ranking: u32,
    /// Size of the ranked cohort.
    pub total_students: u32,
}

impl<'de> Deserialize<'de> for Gpa {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            zf: f64,
            ms: u32,
            bjgms: u32,
            zxf: f64,
            hdxf: f64,
            bjgxf: f64,
            tgl: String,
            xjf: f64,
            xjfpm: String,
            gpa: f64,
            gpapm: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        let pass_rate = parse::parse_percentage("tgl", &raw.tgl).map_err(de::Error::custom)?;
        let (gp_ranking, _) = parse::parse_ranking("xjfpm", &raw.xjfpm).map_err(de::Error::custom)?;
        let (gpa_ranking, total_students) =
            parse::parse_ranking("gpapm", &raw.gpapm).map_err(de::Error::custom)?;

        Ok(Self {
            total_score: raw.zf,
            course_count: raw.ms,
            fail_count: raw.bjgms,
            total_credit: raw.zxf,
            acquired_credit: raw.hdxf,
            failed_credit: raw.bjgxf,
            pass_rate,
            gp: raw.xjf,
            gp_ranking,
            gpa: raw.gpa,
            gpa_ranking,
            total_students,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_portal_payload() {
        let payload = serde_json::json!([
            {"zdm": "cjblws", "szz": "1"},
            {"zdm": "jdblws", "szz": "2"},
            {"zdm": "bjjd", "szz": "缓考,缺考"},
            {"zdm": "bjpjf", "szz": "缺考"},
            {"zdm": "tjqckc", "szz": "MA001,PH002"},
            {"zdm": "atjc", "szz": "1,5"},
            {"zdm": "irrelevant"}
        ]);
        let params = GpaQueryParams::from_portal_defaults(&payload).unwrap();
        assert_eq!(params.gp_round, 1);
        assert_eq!(params.gpa_round, 2);
        assert_eq!(params.course_whole, vec!["MA001", "PH002"]);
        assert_eq!(params.has_roll, Some(true));
        assert_eq!(params.registered, None);
        assert_eq!(params.attending, Some(true));
        assert_eq!(params.condition_logic, ConditionLogic::And);
        assert_eq!(params.course_range, CourseRange::Core);
    }

    #[test]
    fn form_encoding() {
        let params = GpaQueryParams {
            start_term: None,
            end_term: Some(2023_12),
            makeup_as_60: true,
            rebuild_as_60: true,
            gp_round: 1,
            gpa_round: 2,
            has_roll: Some(true),
            ..GpaQueryParams::default()
        };
        let form = params.to_form();
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        assert_eq!(get("qsXnxq"), Some(""));
        assert_eq!(get("zzXnxq"), Some("202312"));
        assert_eq!(get("alsfj"), Some("bkcx"));
        assert_eq!(get("kcfw"), Some("hxkc"));
        assert_eq!(get("tjfw"), Some("njzy"));
        assert_eq!(get("xjzt"), Some("1"));
        // unset tri-state flags stay out of the form
        assert_eq!(get("zczt"), None);
        assert_eq!(get("sfzx"), None);
    }

    #[test]
    fn gpa_decodes_rankings_and_percentage() {
        let gpa: Gpa = serde_json::from_value(serde_json::json!({
            "zf": 2667.0,
            "ms": 31,
            "bjgms": 0,
            "zxf": 87.5,
            "hdxf": 87.5,
            "bjgxf": 0.0,
            "tgl": "100%",
            "xjf": 86.03,
            "xjfpm": "15/120",
            "gpa": 3.51,
            "gpapm": "17/120"
        }))
        .unwrap();
        assert!((gpa.pass_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(gpa.gp_ranking, 15);
        assert_eq!(gpa.gpa_ranking, 17);
        assert_eq!(gpa.total_students, 120);
    }
}
