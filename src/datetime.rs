use chrono::{DateTime, FixedOffset, MappedLocalTime, NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Wall-clock time of a run or programme item together with the offset of its city.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
pub struct LocalDateTime(pub DateTime<FixedOffset>);
impl LocalDateTime {
    pub fn from_local_timezone(local_dt: NaiveDateTime, utc_offset_minutes: i32) -> Option<LocalDateTime> {
        let fixed_offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
        match local_dt.and_local_timezone(fixed_offset) {
            MappedLocalTime::Single(dt) => Some(LocalDateTime(dt.trimmed_to_sec())),
            MappedLocalTime::Ambiguous(_, _) => None,
            MappedLocalTime::None => None,
        }
    }
    /// Calendar date as seen in the run's own city.
    pub fn date_naive(self) -> NaiveDate {
        self.0.date_naive()
    }
    fn to_display_string(self) -> String {
        self.0.format("%F %R").to_string()
    }
    pub(crate) fn to_iso_string(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
    pub(crate) fn from_iso_string(datetime_str: &str) -> Result<Self, anyhow::Error> {
        let dt = DateTime::parse_from_rfc3339(datetime_str)?;
        Ok(Self(dt.trimmed_to_sec()))
    }
}

trait TrimmedToSec {
    fn trimmed_to_sec(self) -> Self;
}
impl TrimmedToSec for DateTime<FixedOffset> {
    fn trimmed_to_sec(self) -> Self {
        let nanos = self.timestamp_subsec_nanos();
        self.checked_sub_signed(chrono::TimeDelta::nanoseconds(nanos as i64))
            .unwrap_or(self)
    }
}

impl<DB: sqlx::Database> sqlx::Type<DB> for LocalDateTime
where
    str: sqlx::Type<DB>,
{
    fn type_info() -> <DB as sqlx::Database>::TypeInfo {
        // TEXT columns only
        <&str as sqlx::Type<DB>>::type_info()
    }
}
impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for LocalDateTime
where
    &'r str: sqlx::Decode<'r, DB>,
{
    fn decode(value: <DB as sqlx::Database>::ValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let value = <&str as sqlx::Decode<DB>>::decode(value)?;
        Ok(LocalDateTime::from_iso_string(value)?)
    }
}

/// Accepts `2025-05-01T18:30`, `2025-05-01 18:30` and the same with seconds.
pub(crate) fn parse_naive_datetime(datetime_str: &str) -> Option<NaiveDateTime> {
    let datetime_str = datetime_str.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(datetime_str, format).ok())
}

pub(crate) fn dtstr(iso_date_str: Option<&str>) -> String {
    let Some(s) = iso_date_str else {
        return "---".to_string()
    };
    if let Ok(dt) = LocalDateTime::from_iso_string(s) {
        dt.to_display_string()
    } else {
        s.to_string()
    }
}

#[test]
fn test_from_local_timezone() {
    let local = parse_naive_datetime("2025-05-01T23:30").unwrap();
    let dt = LocalDateTime::from_local_timezone(local, 180).unwrap();
    assert_eq!(dt.to_iso_string(), "2025-05-01T23:30:00+03:00");
    assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    assert_eq!(dt.0.naive_utc().to_string(), "2025-05-01 20:30:00");
}

#[test]
fn test_parse_naive_datetime() {
    for (dtstr, dtstr2) in &[
        ("2025-03-05 14:32:45", "2025-03-05 14:32:45"),
        ("2025-03-05T14:32:45", "2025-03-05 14:32:45"),
        ("2025-03-05 14:32", "2025-03-05 14:32:00"),
        ("2025-03-05T14:32", "2025-03-05 14:32:00"),
    ] {
        let dt = parse_naive_datetime(dtstr).unwrap();
        assert_eq!(&dt.to_string(), dtstr2)
    }
    assert!(parse_naive_datetime("05/03/2025").is_none());
}

#[test]
fn test_dtstr() {
    assert_eq!(dtstr(Some("2025-03-05T14:32:45+01:00")), "2025-03-05 14:32");
    assert_eq!(dtstr(Some("garbage")), "garbage");
    assert_eq!(dtstr(None), "---");
}
