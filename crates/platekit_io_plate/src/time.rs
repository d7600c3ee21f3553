//! Elapsed-time normalization to decimal hours.

use crate::conf::N_DIGITS_TIME_HR;
use crate::spec::{EnumCellValue, EnumTimeEncoding, PlateIoError};
use crate::util::round_to_digits;

const N_SECONDS_PER_DAY: u64 = 86_400;

/// Convert `HH:MM:SS` or `<day-marker> HH:MM:SS` to decimal hours (3 decimals).
///
/// The last two characters of the day marker are read as a day count and
/// carried as `24 h` each, so `Day02 01:00:00` and `1900-01-02 01:00:00`
/// both give `49.0`. Markers past day 99 wrap. Surrounding whitespace is
/// ignored, so `" 1:00:00 "` reads as `1:00:00`.
pub fn convert_elapsed_clock_to_hours(datetime_text: &str) -> Result<f64, PlateIoError> {
    let l_tokens: Vec<&str> = datetime_text.split_whitespace().collect();
    let (c_time, n_hours_carried) = match l_tokens.as_slice() {
        [c_time] => (*c_time, 0.0),
        [c_days, c_time] => (*c_time, derive_carried_hours(c_days, datetime_text)?),
        _ => {
            return Err(PlateIoError::Format(format!(
                "Time format within the data is improper: {datetime_text:?}. \
                 Expected hours:minutes:seconds, optionally prefixed by a day marker."
            )));
        }
    };

    let l_parts: Vec<&str> = c_time.splitn(3, ':').collect();
    let [c_hours, c_minutes, c_seconds] = l_parts.as_slice() else {
        return Err(PlateIoError::Format(format!(
            "Time format within the data is improper: {datetime_text:?}. \
             Verify that all time points are in the format hours:minutes:seconds."
        )));
    };

    let (Some(n_hours), Some(n_minutes), Some(n_seconds)) = (
        parse_ascii_digits(c_hours),
        parse_ascii_digits(c_minutes),
        parse_ascii_digits(c_seconds),
    ) else {
        return Err(PlateIoError::Format(format!(
            "Time format within the data is improper: {datetime_text:?}. \
             Verify that all time points are in the format hours:minutes:seconds."
        )));
    };

    if n_minutes >= 60.0 || n_seconds >= 60.0 {
        return Err(PlateIoError::Format(format!(
            "Time format within the data is improper: {datetime_text:?}. \
             Verify that minutes and seconds values are less than 60."
        )));
    }

    let n_hours_total = n_hours + n_hours_carried + n_minutes / 60.0 + n_seconds / 3600.0;
    Ok(round_to_digits(n_hours_total, N_DIGITS_TIME_HR))
}

/// Convert elapsed seconds to decimal hours (3 decimals).
pub fn convert_elapsed_seconds_to_hours(seconds: f64) -> f64 {
    round_to_digits(seconds / 3600.0, N_DIGITS_TIME_HR)
}

/// Render a spreadsheet time serial (days) the way the instrument displays it.
///
/// Serials below one day render as `HH:MM:SS`, longer ones as `DayNN HH:MM:SS`.
pub fn derive_elapsed_clock_text(days: f64) -> Result<String, PlateIoError> {
    if !days.is_finite() || days < 0.0 {
        return Err(PlateIoError::Format(format!(
            "Time value {days} is not a valid elapsed time."
        )));
    }

    let n_seconds_total = (days * N_SECONDS_PER_DAY as f64).round() as u64;
    let n_days = n_seconds_total / N_SECONDS_PER_DAY;
    let n_seconds_of_day = n_seconds_total % N_SECONDS_PER_DAY;
    let c_clock = format!(
        "{:02}:{:02}:{:02}",
        n_seconds_of_day / 3600,
        (n_seconds_of_day % 3600) / 60,
        n_seconds_of_day % 60
    );

    if n_days == 0 {
        Ok(c_clock)
    } else {
        Ok(format!("Day{n_days:02} {c_clock}"))
    }
}

/// Convert one time cell under `rule_time`; blank cells give `None`.
pub fn convert_time_cell_to_hours(
    value: &EnumCellValue,
    rule_time: EnumTimeEncoding,
) -> Result<Option<f64>, PlateIoError> {
    match (rule_time, value) {
        (_, EnumCellValue::None) => Ok(None),
        (EnumTimeEncoding::ElapsedClock, EnumCellValue::String(s)) => {
            if s.trim().is_empty() {
                return Ok(None);
            }
            convert_elapsed_clock_to_hours(s).map(Some)
        }
        (EnumTimeEncoding::ElapsedClock, EnumCellValue::Number(n)) => {
            convert_elapsed_clock_to_hours(&derive_elapsed_clock_text(*n)?).map(Some)
        }
        (EnumTimeEncoding::ElapsedSeconds, EnumCellValue::Number(n)) if n.is_finite() => {
            Ok(Some(convert_elapsed_seconds_to_hours(*n)))
        }
        (EnumTimeEncoding::ElapsedSeconds, EnumCellValue::String(s)) => {
            let c_text = s.trim();
            if c_text.is_empty() {
                return Ok(None);
            }
            match c_text.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(convert_elapsed_seconds_to_hours(n))),
                _ => Err(PlateIoError::Format(format!(
                    "Elapsed seconds value {c_text:?} is not numeric."
                ))),
            }
        }
        (EnumTimeEncoding::ElapsedSeconds, EnumCellValue::Number(n)) => Err(
            PlateIoError::Format(format!("Elapsed seconds value {n} is not finite.")),
        ),
    }
}

fn derive_carried_hours(days_token: &str, datetime_text: &str) -> Result<f64, PlateIoError> {
    let n_idx_tail = days_token
        .char_indices()
        .rev()
        .nth(1)
        .map_or(0, |(n_idx, _)| n_idx);
    parse_ascii_digits(&days_token[n_idx_tail..])
        .map(|n_days| n_days * 24.0)
        .ok_or_else(|| {
            PlateIoError::Format(format!(
                "Time format within the data is improper: {datetime_text:?}. \
                 The day marker must end in a two-digit day count."
            ))
        })
}

fn parse_ascii_digits(value: &str) -> Option<f64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok()
}
