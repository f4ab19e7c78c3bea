//! Parsers for the portal's human-oriented string formats.
//!
//! The portal serves most structured data as Chinese display strings:
//! week patterns like `1-16周` or `1-11单周`, class periods like `1-2节`,
//! booleans as `是` or `"1"`, percentages, and `rank/total` pairs. These
//! helpers turn them into typed values; each failure carries the field
//! name and the offending input.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// A set of discrete schedule units (week numbers or class periods).
///
/// Two records conflict in time exactly when their week sets, day and
/// period sets all overlap, so the filter layer only needs membership
/// and intersection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitSet(BTreeSet<u16>);

impl UnitSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(unit: u16) -> Self {
        Self(BTreeSet::from([unit]))
    }

    #[must_use]
    pub fn range(start: u16, end: u16) -> Self {
        Self((start..=end).collect())
    }

    pub fn insert(&mut self, unit: u16) {
        self.0.insert(unit);
    }

    #[must_use]
    pub fn contains(&self, unit: u16) -> bool {
        self.0.contains(&unit)
    }

    /// True when the two sets share at least one unit.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.0.intersection(&other.0).next().is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u16> for UnitSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parity restriction inside a week segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    All,
    Odd,
    Even,
}

/// Parses a week pattern such as `1-16周`, `1-11单周`, `2-12双周`, `3周`,
/// or a comma-separated combination of those segments.
pub fn parse_weeks(raw: &str) -> Result<UnitSet> {
    let mut weeks = UnitSet::new();
    for segment in raw.split([',', '，']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        // Both "1-11单周" and "1-16周(单)" appear in the wild; the
        // parenthesized marker sits after the `周`, the bare one before it.
        let mut parity = Parity::All;
        let mut body = segment;
        if let Some(stripped) = body.strip_suffix("(单)") {
            parity = Parity::Odd;
            body = stripped;
        } else if let Some(stripped) = body.strip_suffix("(双)") {
            parity = Parity::Even;
            body = stripped;
        }
        body = body.trim_end_matches('周');
        if parity == Parity::All {
            if let Some(stripped) = body.strip_suffix('单') {
                parity = Parity::Odd;
                body = stripped;
            } else if let Some(stripped) = body.strip_suffix('双') {
                parity = Parity::Even;
                body = stripped;
            }
        }

        let (start, end) = parse_span(body).ok_or_else(|| Error::parse("zcd", raw))?;
        for week in start..=end {
            let keep = match parity {
                Parity::All => true,
                Parity::Odd => week % 2 == 1,
                Parity::Even => week % 2 == 0,
            };
            if keep {
                weeks.insert(week);
            }
        }
    }

    if weeks.is_empty() {
        return Err(Error::parse("zcd", raw));
    }
    Ok(weeks)
}

/// Parses a class period span such as `1-2节` or `5节`.
pub fn parse_periods(raw: &str) -> Result<UnitSet> {
    let body = raw.trim().trim_end_matches('节');
    let (start, end) = parse_span(body).ok_or_else(|| Error::parse("jcs", raw))?;
    Ok(UnitSet::range(start, end))
}

fn parse_span(body: &str) -> Option<(u16, u16)> {
    let body = body.trim();
    if let Some((lo, hi)) = body.split_once('-') {
        let start = lo.trim().parse().ok()?;
        let end = hi.trim().parse().ok()?;
        (start <= end).then_some((start, end))
    } else {
        let single = body.parse().ok()?;
        Some((single, single))
    }
}

/// `是` is true; everything else (usually `否` or empty) is false.
#[must_use]
pub fn parse_chinese_bool(raw: &str) -> bool {
    raw.trim() == "是"
}

/// Parses the portal's `"0"` / `"1"` flags.
pub fn parse_str_bool(field: &'static str, raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(Error::parse(field, raw)),
    }
}

/// Parses `95%` into `0.95`.
pub fn parse_percentage(field: &'static str, raw: &str) -> Result<f64> {
    let body = raw.trim().strip_suffix('%').ok_or_else(|| Error::parse(field, raw))?;
    let value: f64 = body.trim().parse().map_err(|_| Error::parse(field, raw))?;
    Ok(value / 100.0)
}

/// Parses a `rank/total` pair such as `15/120`.
pub fn parse_ranking(field: &'static str, raw: &str) -> Result<(u32, u32)> {
    let (rank, total) = raw.trim().split_once('/').ok_or_else(|| Error::parse(field, raw))?;
    let rank = rank.trim().parse().map_err(|_| Error::parse(field, raw))?;
    let total = total.trim().parse().map_err(|_| Error::parse(field, raw))?;
    Ok((rank, total))
}

/// Parses a numeric field, erroring with the field name on bad input.
pub fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| Error::parse(field, raw))
}

/// Parses an optional numeric field; empty or placeholder input is `None`.
pub fn parse_optional_number<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<Option<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "无" {
        return Ok(None);
    }
    parse_number(field, trimmed).map(Some)
}

/// Splits a comma- or semicolon-separated display list, dropping empties.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', '，', ';', '；'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Formats a list of units back into the portal's compact range notation,
/// e.g. `[1, 2, 3, 5]` into `1-3,5`.
#[must_use]
pub fn format_ranges(units: &[u16]) -> String {
    let mut sorted: Vec<u16> = units.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts: Vec<String> = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut prev = start;
    for unit in iter.chain(std::iter::once(0)) {
        if unit == prev + 1 {
            prev = unit;
            continue;
        }
        if start == prev {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{prev}"));
        }
        start = unit;
        prev = unit;
    }
    parts.join(",")
}

/// Parses a per-kind hour breakdown such as `理论(32.0)-实验(16.0)`.
pub fn parse_hour_details(field: &'static str, raw: &str) -> Result<Vec<(String, f64)>> {
    let mut details = Vec::new();
    for part in raw.split('-') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let open = part.find('(').ok_or_else(|| Error::parse(field, raw))?;
        let close = part.rfind(')').ok_or_else(|| Error::parse(field, raw))?;
        if close <= open {
            return Err(Error::parse(field, raw));
        }
        let name = part[..open].trim().to_owned();
        let hours: f64 = part[open + 1..close]
            .trim()
            .parse()
            .map_err(|_| Error::parse(field, raw))?;
        details.push((name, hours));
    }
    if details.is_empty() {
        return Err(Error::parse(field, raw));
    }
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_week_range() {
        let weeks = parse_weeks("1-16周").unwrap();
        assert!(weeks.contains(1));
        assert!(weeks.contains(16));
        assert!(!weeks.contains(17));
        assert_eq!(weeks.iter().count(), 16);
    }

    #[test]
    fn odd_week_range() {
        let weeks = parse_weeks("1-11单周").unwrap();
        assert_eq!(weeks.iter().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9, 11]);
    }

    #[test]
    fn even_week_range_with_parenthesized_marker() {
        let weeks = parse_weeks("2-8周(双)").unwrap();
        assert_eq!(weeks.iter().collect::<Vec<_>>(), vec![2, 4, 6, 8]);
    }

    #[test]
    fn parenthesized_marker_without_week_suffix() {
        let weeks = parse_weeks("1-16(单)").unwrap();
        assert_eq!(weeks.iter().collect::<Vec<_>>(), vec![1, 3, 5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn single_week() {
        let weeks = parse_weeks("3周").unwrap();
        assert_eq!(weeks.iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn comma_separated_segments() {
        let weeks = parse_weeks("1-4周,6-8周").unwrap();
        assert_eq!(weeks.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 6, 7, 8]);
    }

    #[test]
    fn garbage_week_string_is_an_error() {
        assert!(matches!(
            parse_weeks("第一周"),
            Err(crate::Error::Parse { field: "zcd", .. })
        ));
    }

    #[test]
    fn period_span() {
        let periods = parse_periods("1-2节").unwrap();
        assert_eq!(periods.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(parse_periods("5节").unwrap().iter().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn overlap_semantics() {
        let a = parse_weeks("1-11单周").unwrap();
        let b = parse_weeks("2-12双周").unwrap();
        let c = parse_weeks("1-16周").unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn booleans() {
        assert!(parse_chinese_bool("是"));
        assert!(!parse_chinese_bool("否"));
        assert!(parse_str_bool("f", "1").unwrap());
        assert!(!parse_str_bool("f", "0").unwrap());
        assert!(parse_str_bool("f", "2").is_err());
    }

    #[test]
    fn percentage() {
        assert!((parse_percentage("tgl", "95%").unwrap() - 0.95).abs() < f64::EPSILON);
        assert!(parse_percentage("tgl", "95").is_err());
    }

    #[test]
    fn ranking() {
        assert_eq!(parse_ranking("xjfpm", "15/120").unwrap(), (15, 120));
        assert!(parse_ranking("xjfpm", "15th").is_err());
    }

    #[test]
    fn optional_numbers() {
        assert_eq!(parse_optional_number::<f64>("jd", "4.0").unwrap(), Some(4.0));
        assert_eq!(parse_optional_number::<f64>("jd", "").unwrap(), None);
        assert_eq!(parse_optional_number::<f64>("jd", "-").unwrap(), None);
        assert!(parse_optional_number::<f64>("jd", "abc").is_err());
    }

    #[test]
    fn list_splitting() {
        assert_eq!(split_list("张三,李四；王五"), vec!["张三", "李四", "王五"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn range_formatting() {
        assert_eq!(format_ranges(&[1, 2, 3, 5]), "1-3,5");
        assert_eq!(format_ranges(&[5, 3, 2, 1]), "1-3,5");
        assert_eq!(format_ranges(&[7]), "7");
        assert_eq!(format_ranges(&[]), "");
    }

    #[test]
    fn hour_details() {
        let details = parse_hour_details("kcxszc", "理论(32.0)-实验(16)").unwrap();
        assert_eq!(
            details,
            vec![("理论".to_owned(), 32.0), ("实验".to_owned(), 16.0)]
        );
        assert!(parse_hour_details("kcxszc", "理论").is_err());
    }
}
