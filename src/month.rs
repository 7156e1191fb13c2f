//! Helpers for the "YYYY-MM" month strings used by budgets, service history,
//! and the dashboard.

use time::{Date, Month, util::days_in_year_month};

use crate::Error;

/// Parse a month string such as "2025-08" into a year and a [Month].
///
/// # Errors
/// Returns [Error::InvalidMonth] if the string is not of the form "YYYY-MM"
/// or the month number is outside 1-12.
pub(crate) fn parse_month(month_string: &str) -> Result<(i32, Month), Error> {
    let invalid = || Error::InvalidMonth(month_string.to_owned());

    let (year_part, month_part) = month_string.split_once('-').ok_or_else(invalid)?;

    if year_part.len() != 4 || month_part.len() != 2 {
        return Err(invalid());
    }

    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let month_number: u8 = month_part.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month_number).map_err(|_| invalid())?;

    Ok((year, month))
}

/// The first and last date of the given month, inclusive.
///
/// Callers must pass a year with at most four digits, as produced by
/// [parse_month] or the calendar's year validation.
pub(crate) fn month_bounds(year: i32, month: Month) -> (Date, Date) {
    // The year is at most four digits and the day values are valid for the
    // month, so the expects are unreachable.
    let first = Date::from_calendar_date(year, month, 1).expect("first day of month is valid");
    let last = Date::from_calendar_date(year, month, days_in_year_month(year, month))
        .expect("last day of month is valid");

    (first, last)
}

#[cfg(test)]
mod tests {
    use time::{Month, macros::date};

    use crate::Error;

    use super::{month_bounds, parse_month};

    #[test]
    fn parses_valid_month() {
        let got = parse_month("2025-08").unwrap();

        assert_eq!(got, (2025, Month::August));
    }

    #[test]
    fn rejects_month_thirteen() {
        let got = parse_month("2025-13");

        assert_eq!(got, Err(Error::InvalidMonth("2025-13".to_owned())));
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(parse_month("202508").is_err());
    }

    #[test]
    fn rejects_single_digit_month() {
        assert!(parse_month("2025-8").is_err());
    }

    #[test]
    fn bounds_cover_leap_february() {
        let (first, last) = month_bounds(2024, Month::February);

        assert_eq!(first, date!(2024 - 02 - 01));
        assert_eq!(last, date!(2024 - 02 - 29));
    }

    #[test]
    fn bounds_cover_thirty_one_day_month() {
        let (first, last) = month_bounds(2025, Month::January);

        assert_eq!(first, date!(2025 - 01 - 01));
        assert_eq!(last, date!(2025 - 01 - 31));
    }
}
