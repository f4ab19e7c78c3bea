//! Serde adapters for the portal's display-string fields.
//!
//! The portal mixes JSON numbers and stringified numbers freely, and
//! encodes structure in Chinese display text. These deserializers bridge
//! that to the typed models via the parsers in [`crate::parse`].

use serde::{Deserialize, Deserializer, de};

use crate::parse::{
    UnitSet, parse_chinese_bool, parse_hour_details, parse_periods, parse_weeks, split_list,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

impl NumOrStr {
    fn as_f64<E: de::Error>(&self) -> Result<f64, E> {
        match self {
            Self::Num(n) => Ok(*n),
            Self::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("not a number: `{s}`"))),
        }
    }
}

/// Number that may arrive as a JSON number or a string.
pub(crate) fn flex_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    NumOrStr::deserialize(deserializer)?.as_f64()
}

pub(crate) fn opt_flex_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => v.as_f64().map(Some),
    }
}

pub(crate) fn flex_u16<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let value = NumOrStr::deserialize(deserializer)?.as_f64()?;
    Ok(value as u16)
}

pub(crate) fn opt_flex_u32<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u32>, D::Error> {
    Ok(opt_flex_f64(deserializer)?.map(|v| v as u32))
}

/// `zcd`-style week pattern into a [`UnitSet`].
pub(crate) fn weeks<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnitSet, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_weeks(&raw).map_err(de::Error::custom)
}

/// `jcs`-style period span into a [`UnitSet`].
pub(crate) fn periods<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UnitSet, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_periods(&raw).map_err(de::Error::custom)
}

/// `是`/`否` into a bool; absent field should use `#[serde(default)]`.
pub(crate) fn chinese_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(parse_chinese_bool(&raw))
}

/// Comma- or semicolon-separated display list.
pub(crate) fn name_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| split_list(&s)).unwrap_or_default())
}

/// Optional `理论(32.0)-实验(16)` style hour breakdown.
pub(crate) fn hour_details<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<(String, f64)>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_hour_details("kcxszc", &raw)
            .map(Some)
            .map_err(de::Error::custom),
    }
}

/// Optional string where empty means absent.
pub(crate) fn opt_str<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if s.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}
