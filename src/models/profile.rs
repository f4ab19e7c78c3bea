//! Student profile scraped from the account information page.
//!
//! Unlike the JSON endpoints, the profile is a server-rendered form whose
//! value cells carry no stable ids, so each field is addressed by its
//! position in the page grid. Every cell path below is a chain of
//! `div:nth-of-type` hops under the form body.

use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Student gender as printed on the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// The student profile. Fields the portal leaves blank are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub student_id: i64,
    pub name: String,
    pub name_pinyin: Option<String>,
    pub former_name: Option<String>,
    pub gender: Gender,
    pub certificate_type: String,
    pub certificate_number: i64,
    pub birth_date: NaiveDate,
    pub enrollment_date: NaiveDate,
    pub birthplace: Option<String>,
    pub ethnicity: Option<String>,
    pub native_place: Option<String>,
    pub foreign_status: Option<String>,
    pub political_status: Option<String>,
    pub enrollment_province: Option<String>,
    pub nationality: Option<String>,
    pub domicile_place: Option<String>,
    pub cee_candidate_number: Option<i64>,
    pub middle_school: Option<String>,
    pub religion: Option<String>,
    pub email: Option<String>,
    pub cellphone: Option<i64>,
    pub family_address: Option<String>,
    pub mailing_address: Option<String>,
    pub landline: Option<i64>,
    pub zip_code: Option<u32>,
}

/// Grid root: the form body holding the profile sections.
const GRID_PREFIX: &str = "html > body > div:nth-of-type(1) > div > div > form > div \
     > div:nth-of-type(2) > div > div > div > div";

/// Reads the text of one value cell, addressed by nested div positions.
/// A missing or blank cell is `None`.
fn cell(doc: &Html, path: &[usize]) -> Option<String> {
    let mut raw = String::from(GRID_PREFIX);
    for idx in path {
        raw.push_str(&format!(" > div:nth-of-type({idx}) > div"));
    }
    raw.push_str(" > div > p");
    let selector = Selector::parse(&raw).ok()?;

    let element = doc.select(&selector).next()?;
    let text = element.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_owned())
    }
}

fn required(doc: &Html, path: &[usize], field: &'static str) -> Result<String> {
    cell(doc, path).ok_or_else(|| Error::parse(field, "<missing profile field>"))
}

fn number(field: &'static str, raw: &str) -> Result<i64> {
    raw.parse().map_err(|_| Error::parse(field, raw))
}

fn opt_number(field: &'static str, raw: Option<String>) -> Result<Option<i64>> {
    raw.map(|s| number(field, &s)).transpose()
}

fn date(field: &'static str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| Error::parse(field, raw))
}

/// Parses the profile page into a [`Profile`].
pub fn parse_profile(html: &str) -> Result<Profile> {
    let doc = Html::parse_document(html);

    let zip_code = cell(&doc, &[4, 6])
        .map(|s| s.parse::<u32>().map_err(|_| Error::parse("zip_code", s.clone())))
        .transpose()?;

    Ok(Profile {
        student_id: number("student_id", &required(&doc, &[1, 1, 1], "student_id")?)?,
        name: required(&doc, &[1, 1, 2], "name")?,
        name_pinyin: cell(&doc, &[1, 1, 3]),
        former_name: cell(&doc, &[1, 1, 4]),
        gender: match required(&doc, &[1, 1, 5], "gender")?.as_str() {
            "男" => Gender::Male,
            _ => Gender::Female,
        },
        certificate_type: required(&doc, &[1, 1, 6], "certificate_type")?,
        certificate_number: number(
            "certificate_number",
            &required(&doc, &[1, 1, 7], "certificate_number")?,
        )?,
        birth_date: date("birth_date", &required(&doc, &[1, 4], "birth_date")?)?,
        enrollment_date: date(
            "enrollment_date",
            &required(&doc, &[1, 8], "enrollment_date")?,
        )?,
        birthplace: cell(&doc, &[1, 12]),
        ethnicity: cell(&doc, &[1, 5]),
        native_place: cell(&doc, &[1, 9]),
        foreign_status: cell(&doc, &[1, 13]),
        political_status: cell(&doc, &[1, 7]),
        enrollment_province: cell(&doc, &[1, 11]),
        nationality: cell(&doc, &[1, 14]),
        domicile_place: cell(&doc, &[1, 10]),
        cee_candidate_number: opt_number("cee_candidate_number", cell(&doc, &[3, 1]))?,
        middle_school: cell(&doc, &[3, 2]),
        religion: cell(&doc, &[3, 5]),
        email: cell(&doc, &[4, 1]),
        cellphone: opt_number("cellphone", cell(&doc, &[4, 2]))?,
        family_address: cell(&doc, &[4, 3]),
        mailing_address: cell(&doc, &[4, 4]),
        landline: opt_number("landline", cell(&doc, &[4, 5]))?,
        zip_code,
    })
}
