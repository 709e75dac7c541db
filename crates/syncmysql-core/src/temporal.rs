//! Calendar helpers for the `Date`, `Time` and `Timestamp` value encodings.
//!
//! `Date` is days since 1970-01-01, `Time` is signed microseconds (MySQL TIME
//! spans -838:59:59 to 838:59:59), `Timestamp` is microseconds since the epoch.
//! Conversions use the civil-calendar algorithms from
//! <https://howardhinnant.github.io/date_algorithms.html>.

pub const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Days since 1970-01-01 for a proleptic Gregorian date.
pub fn days_from_civil(year: i32, month: u32, day: u32) -> i32 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i32 - 719_468
}

/// Inverse of [`days_from_civil`]: `(year, month, day)`.
pub fn civil_from_days(days: i32) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i32 + era * 400 + i32::from(month <= 2);
    (year, month, day)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 0,
    }
}

/// `YYYY-MM-DD`
pub fn format_date(days: i32) -> String {
    let (y, m, d) = civil_from_days(days);
    format!("{:04}-{:02}-{:02}", y, m, d)
}

fn push_fraction(out: &mut String, micros: i64) {
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
}

/// `[-]HH:MM:SS[.ffffff]`; hours may exceed 24.
pub fn format_time(micros: i64) -> String {
    let mut out = String::new();
    if micros < 0 {
        out.push('-');
    }
    let abs = micros.unsigned_abs();
    let total_secs = abs / 1_000_000;
    out.push_str(&format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60
    ));
    push_fraction(&mut out, (abs % 1_000_000) as i64);
    out
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]` for microseconds since the epoch.
pub fn format_datetime(micros: i64) -> String {
    let days = micros.div_euclid(MICROS_PER_DAY);
    let in_day = micros.rem_euclid(MICROS_PER_DAY);
    let secs = in_day / MICROS_PER_SECOND;
    let mut out = format!(
        "{} {:02}:{:02}:{:02}",
        format_date(days as i32),
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );
    push_fraction(&mut out, in_day % MICROS_PER_SECOND);
    out
}

/// Parse `YYYY-MM-DD`. Zero dates and out-of-range components yield `None`.
pub fn parse_date(s: &str) -> Option<i32> {
    let mut parts = s.trim().splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
        return None;
    }
    Some(days_from_civil(year, month, day))
}

fn parse_fraction(frac: &str) -> Option<i64> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = &frac[..frac.len().min(6)];
    let value: i64 = digits.parse().ok()?;
    Some(value * 10_i64.pow(6 - digits.len() as u32))
}

/// Parse `[-]H+:MM:SS[.f+]` into signed microseconds.
pub fn parse_time(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (clock, frac) = match body.split_once('.') {
        Some((clock, frac)) => (clock, parse_fraction(frac)?),
        None => (body, 0),
    };
    let mut parts = clock.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if minutes > 59 || seconds > 59 || hours < 0 {
        return None;
    }
    let micros = (hours * 3600 + minutes * 60 + seconds) * MICROS_PER_SECOND + frac;
    Some(if negative { -micros } else { micros })
}

/// Parse `YYYY-MM-DD[ HH:MM:SS[.f+]]` (a `T` separator is accepted too).
pub fn parse_datetime(s: &str) -> Option<i64> {
    let s = s.trim();
    let (date, clock) = match s.split_once([' ', 'T']) {
        Some((date, clock)) => (date, Some(clock)),
        None => (s, None),
    };
    let days = parse_date(date)?;
    let in_day = match clock {
        Some(clock) => {
            let micros = parse_time(clock)?;
            if !(0..MICROS_PER_DAY).contains(&micros) {
                return None;
            }
            micros
        }
        None => 0,
    };
    Some(i64::from(days) * MICROS_PER_DAY + in_day)
}
