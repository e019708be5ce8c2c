//! Timestamps and durations: parsing, formatting, arithmetic and accessors.

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike};
use chrono_tz::Tz;

use super::functions::{Function, Overload};
use super::value::{Duration, Kind, Timestamp};
use super::{EvalError, Value};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Parse an RFC 3339 timestamp string.
///
/// Supports formats like:
/// - "2009-02-13T23:31:30Z"
/// - "2009-02-13T23:31:30.123456789Z"
/// - "2009-02-13T23:31:30+01:00"
pub fn parse_timestamp(s: &str) -> Result<Timestamp, EvalError> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| EvalError::invalid_argument(format!("invalid timestamp format: {}", e)))?;

    let ts = Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    };
    check_timestamp(ts)
}

/// Parse a duration string such as `"1h30m"`, `"1.5s"` or `"-250ms"`.
pub fn parse_duration(s: &str) -> Result<Duration, EvalError> {
    let invalid = |msg: String| EvalError::invalid_argument(msg);

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if body.is_empty() {
        return Err(invalid(format!("invalid duration: '{}'", s)));
    }
    if body == "0" {
        return Ok(Duration::default());
    }

    let mut total_nanos: i128 = 0;
    let mut remaining = body;

    while !remaining.is_empty() {
        let num_end = remaining
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(remaining.len());
        if num_end == 0 {
            return Err(invalid(format!(
                "invalid duration format: expected number at '{}'",
                remaining
            )));
        }
        let num_str = &remaining[..num_end];
        remaining = &remaining[num_end..];

        let unit_end = remaining
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(remaining.len());
        if unit_end == 0 {
            return Err(invalid(format!(
                "invalid duration: missing unit after '{}'",
                num_str
            )));
        }
        let unit = &remaining[..unit_end];
        remaining = &remaining[unit_end..];

        let multiplier: i128 = match unit {
            "h" => 3_600 * NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "s" => NANOS_PER_SECOND,
            "ms" => 1_000_000,
            "us" | "µs" => 1_000,
            "ns" => 1,
            _ => return Err(invalid(format!("invalid duration unit: '{}'", unit))),
        };

        let nanos = if num_str.contains('.') {
            let num: f64 = num_str
                .parse()
                .map_err(|_| invalid(format!("invalid number in duration: '{}'", num_str)))?;
            (num * multiplier as f64) as i128
        } else {
            let num: i128 = num_str
                .parse()
                .map_err(|_| invalid(format!("invalid number in duration: '{}'", num_str)))?;
            num.checked_mul(multiplier)
                .ok_or_else(|| EvalError::out_of_range("duration out of range"))?
        };
        total_nanos = total_nanos
            .checked_add(nanos)
            .ok_or_else(|| EvalError::out_of_range("duration out of range"))?;
    }

    if negative {
        total_nanos = -total_nanos;
    }
    duration_from_nanos(total_nanos)
}

/// Format a timestamp as an RFC 3339 string with nanosecond precision.
///
/// Examples:
/// - "2009-02-13T23:31:30Z" (no fractional seconds)
/// - "2009-02-13T23:31:30.123456789Z" (with nanoseconds)
pub fn format_timestamp(ts: &Timestamp) -> String {
    let Some(dt) = ts.to_datetime_utc() else {
        return format!("{}s", ts.seconds);
    };
    let nanos = format!("{:09}", ts.nanos);
    let trimmed = nanos.trim_end_matches('0');
    if trimmed.is_empty() {
        dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        format!("{}.{}Z", dt.format("%Y-%m-%dT%H:%M:%S"), trimmed)
    }
}

/// Format a duration as `"Xs"` or `"X.XXXs"` with trailing zeros trimmed.
pub fn format_duration(d: &Duration) -> String {
    let total_nanos = d.to_nanos();
    let sign = if total_nanos < 0 { "-" } else { "" };
    let abs_nanos = total_nanos.abs();
    let secs = abs_nanos / NANOS_PER_SECOND;
    let frac = abs_nanos % NANOS_PER_SECOND;

    if frac == 0 {
        format!("{}{}s", sign, secs)
    } else {
        let frac_str = format!("{:09}", frac);
        format!("{}{}.{}s", sign, secs, frac_str.trim_end_matches('0'))
    }
}

fn check_timestamp(ts: Timestamp) -> Result<Timestamp, EvalError> {
    if ts.is_valid() {
        Ok(ts)
    } else {
        Err(EvalError::out_of_range(
            "timestamp out of range: must be between year 0001 and 9999",
        ))
    }
}

fn duration_from_nanos(nanos: i128) -> Result<Duration, EvalError> {
    let seconds = i64::try_from(nanos / NANOS_PER_SECOND)
        .map_err(|_| EvalError::out_of_range("duration out of range"))?;
    let duration = Duration::new(seconds, (nanos % NANOS_PER_SECOND) as i32);
    if duration.is_valid() {
        Ok(duration)
    } else {
        Err(EvalError::out_of_range(
            "duration out of range: must be within approximately 10000 years",
        ))
    }
}

fn timestamp_from_nanos(nanos: i128) -> Result<Timestamp, EvalError> {
    let seconds = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND))
        .map_err(|_| EvalError::out_of_range("timestamp out of range"))?;
    check_timestamp(Timestamp::new(
        seconds,
        nanos.rem_euclid(NANOS_PER_SECOND) as i32,
    ))
}

fn timestamp_nanos(ts: &Timestamp) -> i128 {
    ts.seconds as i128 * NANOS_PER_SECOND + ts.nanos as i128
}

pub fn add_timestamp_duration(ts: &Timestamp, d: &Duration) -> Result<Timestamp, EvalError> {
    timestamp_from_nanos(timestamp_nanos(ts) + d.to_nanos())
}

pub fn sub_timestamp_duration(ts: &Timestamp, d: &Duration) -> Result<Timestamp, EvalError> {
    timestamp_from_nanos(timestamp_nanos(ts) - d.to_nanos())
}

pub fn sub_timestamps(a: &Timestamp, b: &Timestamp) -> Result<Duration, EvalError> {
    duration_from_nanos(timestamp_nanos(a) - timestamp_nanos(b))
}

pub fn add_durations(a: &Duration, b: &Duration) -> Result<Duration, EvalError> {
    duration_from_nanos(a.to_nanos() + b.to_nanos())
}

pub fn sub_durations(a: &Duration, b: &Duration) -> Result<Duration, EvalError> {
    duration_from_nanos(a.to_nanos() - b.to_nanos())
}

/// Parse a timezone string.
///
/// Supports:
/// - IANA timezone names: "America/New_York", "Europe/London", "Australia/Sydney"
/// - Fixed UTC offsets: "+01:00", "-05:30", "02:00" (positive assumed)
pub fn parse_timezone(tz: &str) -> Result<TimezoneInfo, EvalError> {
    if let Ok(tz_parsed) = tz.parse::<Tz>() {
        return Ok(TimezoneInfo::Iana(tz_parsed));
    }
    parse_fixed_offset(tz)
        .map(TimezoneInfo::Fixed)
        .map_err(EvalError::invalid_argument)
}

/// Parse a fixed UTC offset string like "+01:00", "-05:30", or "02:00".
fn parse_fixed_offset(s: &str) -> Result<FixedOffset, String> {
    let s = s.trim();
    let (negative, rest) = if let Some(r) = s.strip_prefix('-') {
        (true, r)
    } else if let Some(r) = s.strip_prefix('+') {
        (false, r)
    } else {
        (false, s)
    };

    let Some((hours, minutes)) = rest.split_once(':') else {
        return Err(format!("invalid timezone: '{}'", s));
    };
    let hours: i32 = hours
        .parse()
        .map_err(|_| format!("invalid hours in timezone: '{}'", hours))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid minutes in timezone: '{}'", minutes))?;

    let total_seconds = (hours * 3600 + minutes * 60) * if negative { -1 } else { 1 };
    FixedOffset::east_opt(total_seconds)
        .ok_or_else(|| format!("timezone offset out of range: '{}'", s))
}

/// Represents either an IANA timezone or a fixed offset.
pub enum TimezoneInfo {
    Iana(Tz),
    Fixed(FixedOffset),
}

impl TimezoneInfo {
    /// Convert a UTC timestamp to a DateTime in this timezone.
    pub fn datetime_from_timestamp(&self, ts: &Timestamp) -> Option<DateTime<FixedOffset>> {
        let utc_dt = ts.to_datetime_utc()?;
        match self {
            TimezoneInfo::Iana(tz) => {
                let local = utc_dt.with_timezone(tz);
                let offset = local.offset().fix();
                Some(local.with_timezone(&offset))
            }
            TimezoneInfo::Fixed(offset) => Some(utc_dt.with_timezone(offset)),
        }
    }
}

/// Timestamp accessor component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampComponent {
    /// Full 4-digit year.
    FullYear,
    /// Month (0-11, 0 = January).
    Month,
    /// Day of month (1-31, 1-indexed).
    Date,
    /// Day of month (0-30, 0-indexed).
    DayOfMonth,
    /// Day of week (0-6, 0 = Sunday).
    DayOfWeek,
    /// Day of year (0-365).
    DayOfYear,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl TimestampComponent {
    const ALL: [TimestampComponent; 10] = [
        TimestampComponent::FullYear,
        TimestampComponent::Month,
        TimestampComponent::Date,
        TimestampComponent::DayOfMonth,
        TimestampComponent::DayOfWeek,
        TimestampComponent::DayOfYear,
        TimestampComponent::Hours,
        TimestampComponent::Minutes,
        TimestampComponent::Seconds,
        TimestampComponent::Milliseconds,
    ];

    /// The CEL function name, e.g. `getFullYear`.
    pub fn function_name(self) -> &'static str {
        match self {
            TimestampComponent::FullYear => "getFullYear",
            TimestampComponent::Month => "getMonth",
            TimestampComponent::Date => "getDate",
            TimestampComponent::DayOfMonth => "getDayOfMonth",
            TimestampComponent::DayOfWeek => "getDayOfWeek",
            TimestampComponent::DayOfYear => "getDayOfYear",
            TimestampComponent::Hours => "getHours",
            TimestampComponent::Minutes => "getMinutes",
            TimestampComponent::Seconds => "getSeconds",
            TimestampComponent::Milliseconds => "getMilliseconds",
        }
    }

    /// Get the component value from a DateTime.
    pub fn extract<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> i64 {
        match self {
            TimestampComponent::FullYear => dt.year() as i64,
            TimestampComponent::Month => dt.month0() as i64,
            TimestampComponent::Date => dt.day() as i64,
            TimestampComponent::DayOfMonth => dt.day0() as i64,
            TimestampComponent::DayOfWeek => dt.weekday().num_days_from_sunday() as i64,
            TimestampComponent::DayOfYear => dt.ordinal0() as i64,
            TimestampComponent::Hours => dt.hour() as i64,
            TimestampComponent::Minutes => dt.minute() as i64,
            TimestampComponent::Seconds => dt.second() as i64,
            TimestampComponent::Milliseconds => (dt.nanosecond() / 1_000_000) as i64,
        }
    }

    /// Total duration in this unit, for the components durations support.
    fn extract_duration(&self, d: &Duration) -> Option<i64> {
        match self {
            TimestampComponent::Hours => Some(d.get_hours()),
            TimestampComponent::Minutes => Some(d.get_minutes()),
            TimestampComponent::Seconds => Some(d.seconds),
            TimestampComponent::Milliseconds => Some(d.get_milliseconds()),
            _ => None,
        }
    }
}

fn timestamp_component(component: TimestampComponent, args: &[Value]) -> Value {
    let (ts, tz) = match args {
        [Value::Timestamp(ts)] => (ts, None),
        [Value::Timestamp(ts), Value::String(tz)] => (ts, Some(tz)),
        _ => return Value::error(EvalError::no_matching_overload(component.function_name())),
    };
    let dt = match tz {
        None => ts.to_datetime_utc().map(|dt| dt.fixed_offset()),
        Some(tz) => match parse_timezone(&tz.to_cow()) {
            Ok(info) => info.datetime_from_timestamp(ts),
            Err(err) => return Value::error(err),
        },
    };
    match dt {
        Some(dt) => Value::Int(component.extract(&dt)),
        None => Value::error(EvalError::out_of_range("timestamp out of range")),
    }
}

/// Timestamp and duration accessor functions (`ts.getHours()`, `d.getSeconds()`, ...).
pub(crate) fn accessor_functions() -> Vec<Function> {
    TimestampComponent::ALL
        .iter()
        .map(|&component| {
            let name = component.function_name();
            let suffix = &name[3..].to_ascii_lowercase();
            let mut function = Function::new(name)
                .with_overload(Overload::method(
                    format!("timestamp_to_{}", suffix),
                    &[Kind::Timestamp],
                    move |args| timestamp_component(component, args),
                ))
                .with_overload(Overload::method(
                    format!("timestamp_to_{}_with_tz", suffix),
                    &[Kind::Timestamp, Kind::String],
                    move |args| timestamp_component(component, args),
                ));
            if component.extract_duration(&Duration::default()).is_some() {
                function = function.with_overload(Overload::method(
                    format!("duration_to_{}", suffix),
                    &[Kind::Duration],
                    move |args| match args {
                        [Value::Duration(d)] => component
                            .extract_duration(d)
                            .map(Value::Int)
                            .unwrap_or_else(|| {
                                Value::error(EvalError::no_matching_overload(name))
                            }),
                        _ => Value::error(EvalError::no_matching_overload(name)),
                    },
                ));
            }
            function
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalErrorKind;

    #[test]
    fn test_parse_timestamp_basic() {
        let ts = parse_timestamp("2009-02-13T23:31:30Z").unwrap();
        assert_eq!(ts.seconds, 1234567890);
        assert_eq!(ts.nanos, 0);
    }

    #[test]
    fn test_parse_timestamp_with_nanos() {
        let ts = parse_timestamp("2009-02-13T23:31:30.123456789Z").unwrap();
        assert_eq!(ts.seconds, 1234567890);
        assert_eq!(ts.nanos, 123456789);
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let ts = parse_timestamp("2009-02-13T18:31:30-05:00").unwrap();
        assert_eq!(ts.seconds, 1234567890);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::InvalidArgument);
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100s").unwrap(), Duration::new(100, 0));
        assert_eq!(parse_duration("2h").unwrap(), Duration::new(7200, 0));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::new(5400, 0));
        assert_eq!(parse_duration("-30s").unwrap(), Duration::new(-30, 0));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::new(0, 500_000_000));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::new(5400, 0));
        assert_eq!(parse_duration("0").unwrap(), Duration::new(0, 0));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("3d").is_err());
        assert_eq!(
            parse_duration("999999999999h").unwrap_err().kind,
            EvalErrorKind::OutOfRange
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(&Timestamp::new(1234567890, 0)),
            "2009-02-13T23:31:30Z"
        );
        assert_eq!(
            format_timestamp(&Timestamp::new(1234567890, 123000000)),
            "2009-02-13T23:31:30.123Z"
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::new(100, 0)), "100s");
        assert_eq!(format_duration(&Duration::new(1, 500000000)), "1.5s");
        assert_eq!(format_duration(&Duration::new(0, -250_000_000)), "-0.25s");
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::new(10, 500_000_000);
        let later = add_timestamp_duration(&ts, &Duration::new(0, 700_000_000)).unwrap();
        assert_eq!(later, Timestamp::new(11, 200_000_000));
        let earlier = sub_timestamp_duration(&ts, &Duration::new(11, 0)).unwrap();
        assert_eq!(earlier, Timestamp::new(-1, 500_000_000));
        assert_eq!(sub_timestamps(&later, &ts).unwrap(), Duration::new(0, 700_000_000));
    }

    #[test]
    fn test_timestamp_overflow() {
        let max = Timestamp::new(crate::eval::value::MAX_TIMESTAMP_SECONDS, 0);
        let err = add_timestamp_duration(&max, &Duration::new(1, 0)).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::OutOfRange);
    }

    #[test]
    fn test_parse_timezone() {
        assert!(matches!(
            parse_timezone("America/New_York").unwrap(),
            TimezoneInfo::Iana(_)
        ));
        assert!(matches!(
            parse_timezone("+05:30").unwrap(),
            TimezoneInfo::Fixed(_)
        ));
        assert!(matches!(
            parse_timezone("05:30").unwrap(),
            TimezoneInfo::Fixed(_)
        ));
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_timestamp_component_extract() {
        let dt = Timestamp::new(1234567890, 0).to_datetime_utc().unwrap();
        assert_eq!(TimestampComponent::FullYear.extract(&dt), 2009);
        assert_eq!(TimestampComponent::Month.extract(&dt), 1);
        assert_eq!(TimestampComponent::Date.extract(&dt), 13);
        assert_eq!(TimestampComponent::DayOfMonth.extract(&dt), 12);
        assert_eq!(TimestampComponent::DayOfWeek.extract(&dt), 5);
        assert_eq!(TimestampComponent::Hours.extract(&dt), 23);
    }

    #[test]
    fn test_accessor_with_timezone() {
        let ts = Value::timestamp(1234567890, 0);
        let result = timestamp_component(
            TimestampComponent::Hours,
            &[ts, Value::string("America/New_York")],
        );
        assert_eq!(result, Value::Int(18));
    }
}
