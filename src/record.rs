//! Raw usage rows as they come from the Seoul Open Data API and as they are
//! persisted in the raw CSV.

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rows the API hands out per request.
pub const PAGE_SIZE: usize = 1000;

/// One station's usage on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(rename = "STAT_DATA", deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(rename = "STA_LOC")]
    pub district: String,
    #[serde(rename = "RENT_NM")]
    pub station: String,
    #[serde(rename = "RENT_ID", default)]
    pub station_id: Option<String>,
    #[serde(rename = "RENT_CNT", default, deserialize_with = "lenient_count")]
    pub rentals: Option<u64>,
    #[serde(rename = "RTN_CNT", default, deserialize_with = "lenient_count")]
    pub returns: Option<u64>,
}

impl UsageRecord {
    pub fn new(
        date: NaiveDate,
        district: impl Into<String>,
        station: impl Into<String>,
        rentals: Option<u64>,
        returns: Option<u64>,
    ) -> Self {
        Self {
            date,
            district: district.into(),
            station: station.into(),
            station_id: None,
            rentals,
            returns,
        }
    }
}

/// One page of API results for a single date.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// One-based index of the first row of this page.
    pub start: usize,
    pub records: Vec<UsageRecord>,
    /// Rows the source sent that could not be turned into records.
    pub skipped: usize,
}

impl Page {
    pub fn new(start: usize, records: Vec<UsageRecord>) -> Self {
        Self {
            start,
            records,
            skipped: 0,
        }
    }

    pub fn with_skipped(start: usize, records: Vec<UsageRecord>, skipped: usize) -> Self {
        Self {
            start,
            records,
            skipped,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A full page means the source may hold more rows for this date.
    /// Skipped rows still count toward fullness.
    pub fn is_full(&self) -> bool {
        self.records.len() + self.skipped >= PAGE_SIZE
    }

    /// Cursor of the page that follows this one.
    pub fn next_start(&self) -> usize {
        self.start + PAGE_SIZE
    }
}

/// Parses a count cell. Blanks, negatives, fractions and text are missing.
pub fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(count_from_f64))
}

fn count_from_f64(v: f64) -> Option<u64> {
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}

/// Parses `YYYY-MM-DD`, `YYYYMMDD` or a `YYYY-MM-DD ...` timestamp prefix.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
        .or_else(|| {
            raw.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

struct CountVisitor;

impl<'de> Visitor<'de> for CountVisitor {
    type Value = Option<u64>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a count, a numeric string or an empty value")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(u64::try_from(v).ok())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(count_from_f64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(parse_count(v))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(self)
    }
}

/// Coerces unparseable counts to `None` instead of failing the whole row.
pub fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    d.deserialize_any(CountVisitor)
}

fn lenient_date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(d)?;
    parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_parse_count_accepts_integers_and_integral_floats() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count("30.0"), Some(30));
    }

    #[test]
    fn test_parse_count_rejects_garbage() {
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("n/a"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("2.5"), None);
        assert_eq!(parse_count("NaN"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2025-10-06"), Some(day(6)));
        assert_eq!(parse_date("20251006"), Some(day(6)));
        assert_eq!(parse_date("2025-10-06 00:00:00"), Some(day(6)));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_json_row_with_mixed_count_types() {
        let json = r#"{"STAT_DATA":"2025-10-06","STA_LOC":"강서구","RENT_NM":"마곡나루역 2번 출구",
            "RENT_ID":"ST-1","RENT_CNT":"15","RTN_CNT":null}"#;
        let record: UsageRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.date, day(6));
        assert_eq!(record.station_id.as_deref(), Some("ST-1"));
        assert_eq!(record.rentals, Some(15));
        assert_eq!(record.returns, None);
    }

    #[test]
    fn test_csv_round_trip_keeps_missing_counts_empty() {
        let record = UsageRecord::new(day(7), "마포구", "합정역", Some(3), None);

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert!(text.starts_with("STAT_DATA,STA_LOC,RENT_NM,RENT_ID,RENT_CNT,RTN_CNT"));
        assert!(text.contains("2025-10-07,마포구,합정역,,3,"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let back: UsageRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_csv_text_count_becomes_missing() {
        let text = "STAT_DATA,STA_LOC,RENT_NM,RENT_CNT,RTN_CNT\n2025-10-06,중구,시청,abc,4\n";
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let record: UsageRecord = reader.deserialize().next().unwrap().unwrap();

        assert_eq!(record.rentals, None);
        assert_eq!(record.returns, Some(4));
        assert_eq!(record.station_id, None);
    }

    #[test]
    fn test_page_fullness_and_cursor() {
        let short = Page::new(1, vec![UsageRecord::new(day(6), "a", "b", Some(1), Some(1))]);
        assert!(!short.is_full());
        assert_eq!(short.next_start(), 1001);

        let full = Page::new(1001, vec![short.records[0].clone(); PAGE_SIZE]);
        assert!(full.is_full());
        assert_eq!(full.next_start(), 2001);

        let patched = Page::with_skipped(1, vec![short.records[0].clone(); PAGE_SIZE - 2], 2);
        assert!(patched.is_full());
    }
}
