//! Text forms of EDM primitives, shared by the JSON and Atom readers.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::edm::EdmSimpleType;
use crate::error::ODataError;
use crate::types::ScalarValue;

/// Where a value sits, for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site<'a> {
    pub owner: &'a str,
    pub property: &'a str,
}

impl Site<'_> {
    pub(crate) fn invalid(&self, expected: EdmSimpleType, raw: &str) -> ODataError {
        ODataError::InvalidValue {
            entity_type: self.owner.to_string(),
            property: self.property.to_string(),
            expected: expected.name().to_string(),
            raw: raw.to_string(),
        }
    }

    pub(crate) fn mismatch(&self, expected: impl Into<String>, raw: &str) -> ODataError {
        ODataError::TypeMismatch {
            entity_type: self.owner.to_string(),
            property: self.property.to_string(),
            expected: expected.into(),
            raw: raw.to_string(),
        }
    }
}

/// Parse the lexical form of `ty` as it appears in Atom content or in a
/// JSON string.
pub(crate) fn parse_text(ty: EdmSimpleType, raw: &str, site: Site<'_>) -> Result<ScalarValue, ODataError> {
    let invalid = || site.invalid(ty, raw);
    let value = match ty {
        EdmSimpleType::String => ScalarValue::String(raw.to_string()),
        EdmSimpleType::Boolean => match raw {
            "true" | "1" => ScalarValue::Boolean(true),
            "false" | "0" => ScalarValue::Boolean(false),
            _ => return Err(invalid()),
        },
        EdmSimpleType::Byte => ScalarValue::Byte(raw.parse().map_err(|_| invalid())?),
        EdmSimpleType::SByte => ScalarValue::SByte(raw.parse().map_err(|_| invalid())?),
        EdmSimpleType::Int16 => ScalarValue::Int16(raw.parse().map_err(|_| invalid())?),
        EdmSimpleType::Int32 => ScalarValue::Int32(raw.parse().map_err(|_| invalid())?),
        EdmSimpleType::Int64 => ScalarValue::Int64(raw.parse().map_err(|_| invalid())?),
        EdmSimpleType::Decimal => {
            ScalarValue::Decimal(BigDecimal::from_str(raw).map_err(|_| invalid())?)
        }
        EdmSimpleType::Double => ScalarValue::Double(parse_float(raw).ok_or_else(invalid)?),
        EdmSimpleType::Single => {
            ScalarValue::Single(parse_float(raw).ok_or_else(invalid)? as f32)
        }
        EdmSimpleType::Guid => ScalarValue::Guid(Uuid::parse_str(raw).map_err(|_| invalid())?),
        EdmSimpleType::Binary => ScalarValue::Binary(STANDARD.decode(raw).map_err(|_| invalid())?),
        EdmSimpleType::DateTime => ScalarValue::DateTime(parse_date_time(raw).ok_or_else(invalid)?),
        EdmSimpleType::DateTimeOffset => {
            ScalarValue::DateTimeOffset(parse_date_time_offset(raw).ok_or_else(invalid)?)
        }
        EdmSimpleType::Time => ScalarValue::Time(parse_time(raw).ok_or_else(invalid)?),
    };
    Ok(value)
}

fn parse_float(raw: &str) -> Option<f64> {
    match raw {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => raw.parse().ok(),
    }
}

/// Split `/Date(ms)/` or `/Date(ms±mmmm)/` into milliseconds and an
/// offset in minutes.
fn parse_date_token(raw: &str) -> Option<(i64, i32)> {
    let inner = raw.strip_prefix("/Date(")?.strip_suffix(")/")?;
    // A leading '-' belongs to the millisecond count, not to an offset.
    let split = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '+' | '-'))
        .map(|(i, _)| i);
    match split {
        Some(split) => {
            let (ms, offset) = inner.split_at(split);
            let minutes: i32 = offset[1..].parse().ok()?;
            let sign = if offset.starts_with('-') { -1 } else { 1 };
            Some((ms.parse().ok()?, sign * minutes))
        }
        None => Some((inner.parse().ok()?, 0)),
    }
}

/// `/Date(ms)/`, RFC 3339, or a zone-less ISO 8601 timestamp read as UTC.
pub(crate) fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Some((ms, _)) = parse_date_token(raw) {
        return DateTime::from_timestamp_millis(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn parse_date_time_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Some((ms, minutes)) = parse_date_token(raw) {
        let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        return DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&offset));
    }
    DateTime::parse_from_rfc3339(raw).ok()
}

/// `PT13H20M30.5S` (the v2 wire form) or `13:20:30`.
pub(crate) fn parse_time(raw: &str) -> Option<NaiveTime> {
    let Some(mut rest) = raw.strip_prefix("PT") else {
        return ["%H:%M:%S%.f", "%H:%M"]
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok());
    };
    if rest.is_empty() {
        return None;
    }
    let mut seconds = 0f64;
    for (unit, scale) in [('H', 3600.0), ('M', 60.0), ('S', 1.0)] {
        if let Some(pos) = rest.find(unit) {
            let amount: f64 = rest[..pos].parse().ok()?;
            seconds += amount * scale;
            rest = &rest[pos + 1..];
        }
    }
    if !rest.is_empty() || !(0.0..86_400.0).contains(&seconds) {
        return None;
    }
    let whole = seconds.trunc() as u32;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(whole, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: Site<'static> = Site {
        owner: "Demo.Thing",
        property: "Value",
    };

    #[test]
    fn date_token_is_epoch_millis() {
        let dt = parse_date_time("/Date(836438400000)/").unwrap();
        assert_eq!(dt.timestamp_millis(), 836_438_400_000);
    }

    #[test]
    fn negative_date_token_before_epoch() {
        let dt = parse_date_time("/Date(-86400000)/").unwrap();
        assert_eq!(dt.timestamp_millis(), -86_400_000);
    }

    #[test]
    fn iso_date_time_without_zone_is_utc() {
        let dt = parse_date_time("1996-07-04T00:00:00").unwrap();
        assert_eq!(dt.timestamp_millis(), 836_438_400_000);
        let dt = parse_date_time("1996-07-04T00:00").unwrap();
        assert_eq!(dt.timestamp_millis(), 836_438_400_000);
        let dt = parse_date_time("1996-07-04T02:00:00+02:00").unwrap();
        assert_eq!(dt.timestamp_millis(), 836_438_400_000);
    }

    #[test]
    fn date_time_offset_keeps_offset() {
        let dt = parse_date_time_offset("/Date(836438400000+0060)/").unwrap();
        assert_eq!(dt.timestamp_millis(), 836_438_400_000);
        assert_eq!(dt.offset().local_minus_utc(), 3600);
        let dt = parse_date_time_offset("/Date(836438400000-0300)/").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -18_000);
    }

    #[test]
    fn time_of_day_from_duration() {
        assert_eq!(parse_time("PT13H20M"), NaiveTime::from_hms_opt(13, 20, 0));
        assert_eq!(parse_time("PT45S"), NaiveTime::from_hms_opt(0, 0, 45));
        assert_eq!(parse_time("13:20:05"), NaiveTime::from_hms_opt(13, 20, 5));
        assert!(parse_time("PT25H").is_none());
        assert!(parse_time("PT").is_none());
    }

    #[test]
    fn unparseable_date_is_invalid_value() {
        let err = parse_text(EdmSimpleType::DateTime, "yesterday", SITE).unwrap_err();
        assert!(matches!(
            err,
            ODataError::InvalidValue { ref property, ref raw, .. } if property == "Value" && raw == "yesterday"
        ));
    }

    #[test]
    fn integers_respect_width() {
        assert_eq!(
            parse_text(EdmSimpleType::Byte, "255", SITE).unwrap(),
            ScalarValue::Byte(255)
        );
        assert!(parse_text(EdmSimpleType::Byte, "256", SITE).is_err());
        assert_eq!(
            parse_text(EdmSimpleType::Int64, "-9000000000", SITE).unwrap(),
            ScalarValue::Int64(-9_000_000_000)
        );
    }

    #[test]
    fn special_floats() {
        assert_eq!(
            parse_text(EdmSimpleType::Double, "INF", SITE).unwrap(),
            ScalarValue::Double(f64::INFINITY)
        );
        assert_eq!(
            parse_text(EdmSimpleType::Single, "1.5", SITE).unwrap(),
            ScalarValue::Single(1.5)
        );
    }

    #[test]
    fn guid_and_binary() {
        let guid = parse_text(EdmSimpleType::Guid, "0b1b2c3d-0000-4000-8000-000000000001", SITE).unwrap();
        assert_eq!(guid.to_string(), "0b1b2c3d-0000-4000-8000-000000000001");
        assert_eq!(
            parse_text(EdmSimpleType::Binary, "3q2+7w==", SITE).unwrap(),
            ScalarValue::Binary(vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert!(parse_text(EdmSimpleType::Binary, "not base64!", SITE).is_err());
    }
}
