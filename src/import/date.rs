/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::import::dataset::CellValue;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y", "%d %b %Y"];
// 10000 is 1927-05-18
const SERIAL_DIGITS: usize = 5;
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a due date cell: a spreadsheet serial, an unambiguous date string or a day-first
/// `DD/MM/YYYY` string separated by `/`, `-` or `.`.
pub fn parse_due_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Number(serial) => from_serial(*serial),
        CellValue::Text(text) => parse_text(text.trim()),
    }
}

/// 1900 date system serial. The epoch is 1899-12-30 so that serials after February 1900 match
/// the spreadsheet's calendar despite its fictitious 1900-02-29.
fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }

    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

fn parse_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    // serials written out as text; shorter digit runs are years or day numbers, not dates
    if text.len() >= SERIAL_DIGITS && text.bytes().all(|byte| byte.is_ascii_digit()) {
        return text.parse::<f64>().ok().and_then(from_serial);
    }

    day_first(text)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|date_time| date_time.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|date_time| date_time.date_naive())
        })
}

fn day_first(text: &str) -> Option<NaiveDate> {
    let parts = text
        .split(|c| matches!(c, '/' | '-' | '.'))
        .map(str::trim)
        .collect::<Vec<_>>();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    // a leading four digit part is year first, not ours
    if day.len() > 2 || month.len() > 2 || !matches!(year.len(), 2 | 4) {
        return None;
    }

    let day = day.parse::<u32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    let mut year = year.parse::<i32>().ok()?;
    if year < 100 {
        year += 2000;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<NaiveDate> {
        parse_due_date(&CellValue::Text(value.to_owned()))
    }

    fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, day)
    }

    #[test]
    fn test_serial() {
        assert_eq!(parse_due_date(&CellValue::Number(45306.0)), date(2024, 1, 15));
        // the time of day is dropped
        assert_eq!(parse_due_date(&CellValue::Number(45306.75)), date(2024, 1, 15));
        assert_eq!(parse_due_date(&CellValue::Number(1.0)), date(1899, 12, 31));
        assert_eq!(parse_due_date(&CellValue::Number(0.0)), None);
        assert_eq!(parse_due_date(&CellValue::Number(-3.0)), None);
        assert_eq!(text("45306"), date(2024, 1, 15));
    }

    #[test]
    fn test_day_first_with_any_separator() {
        for value in ["15/01/2024", "15-01-2024", "15.01.2024", "15/1/24"] {
            assert_eq!(text(value), date(2024, 1, 15), "{}", value);
        }

        // day before month, never month before day
        assert_eq!(text("03/04/2024"), date(2024, 4, 3));
        assert_eq!(text("01/15/2024"), None);
    }

    #[test]
    fn test_unambiguous_strings() {
        assert_eq!(text("2024-01-15"), date(2024, 1, 15));
        assert_eq!(text("2024/01/15"), date(2024, 1, 15));
        assert_eq!(text("2024-01-15T10:30:00"), date(2024, 1, 15));
        assert_eq!(text("2024-01-15 10:30:00"), date(2024, 1, 15));
        assert_eq!(text("2024-01-15T10:30:00+02:00"), date(2024, 1, 15));
        assert_eq!(text("15 January 2024"), date(2024, 1, 15));
        assert_eq!(text("January 15, 2024"), date(2024, 1, 15));
    }

    #[test]
    fn test_rejects_garbage() {
        for value in [
            "",
            "  ",
            "tomorrow",
            "31/02/2024",
            "15/01",
            "a/b/c",
            "15.01",
            "2024",
            "45306.5",
            "1e5",
        ] {
            assert_eq!(text(value), None, "{}", value);
        }
    }
}
