use chrono::NaiveDate;
use crate::error::RuleError;

/// Date-only comparison. A run late in the evening of the last day in a city east of UTC
/// is judged by its local calendar date, no offset adjustment is made at the boundary.
pub fn check_within_event(date: NaiveDate, date_start: NaiveDate, date_end: NaiveDate) -> Result<(), RuleError> {
    if date < date_start || date > date_end {
        return Err(RuleError::DateOutOfRange { date, date_start, date_end });
    }
    Ok(())
}

pub fn check_date_range(date_start: NaiveDate, date_end: NaiveDate) -> Result<(), RuleError> {
    if date_start > date_end {
        return Err(RuleError::Invalid(format!("Start date {date_start} is after end date {date_end}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%F").unwrap()
    }

    #[test]
    fn test_within_event_inclusive() {
        let (start, end) = (d("2025-05-01"), d("2025-05-03"));
        assert!(check_within_event(d("2025-05-01"), start, end).is_ok());
        assert!(check_within_event(d("2025-05-02"), start, end).is_ok());
        assert!(check_within_event(d("2025-05-03"), start, end).is_ok());
        assert_eq!(
            check_within_event(d("2025-05-04"), start, end),
            Err(RuleError::DateOutOfRange { date: d("2025-05-04"), date_start: start, date_end: end })
        );
        assert!(check_within_event(d("2025-04-30"), start, end).is_err());
    }

    #[test]
    fn test_date_range() {
        assert!(check_date_range(d("2025-05-01"), d("2025-05-01")).is_ok());
        assert!(matches!(check_date_range(d("2025-05-02"), d("2025-05-01")), Err(RuleError::Invalid(_))));
    }
}
