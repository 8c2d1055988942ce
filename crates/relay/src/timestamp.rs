//! Per-row timestamp resolution
//!
//! Either a configured column-format override or the default
//! "Timestamp" column heuristic. Resolution is a pure function of
//! (row, rule); a row that fails to resolve is dropped downstream.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use contracts::{Row, TimestampOverride, Value};

/// Literal token joining the two (column, format) pairs of an override.
const FORMAT_JOIN: &str = "||";

/// First rule matching the result name, in declaration order.
pub fn find_override<'a>(
    rules: &'a [TimestampOverride],
    result_name: &str,
) -> Option<&'a TimestampOverride> {
    rules.iter().find(|rule| rule.result_name == result_name)
}

/// Resolve a row timestamp; `None` drops the row from sink output.
pub fn resolve(row: &Row, rule: Option<&TimestampOverride>) -> Option<DateTime<Utc>> {
    match rule {
        Some(rule) => resolve_with_override(row, rule),
        None => resolve_default(row),
    }
}

fn resolve_with_override(row: &Row, rule: &TimestampOverride) -> Option<DateTime<Utc>> {
    let has_second = !rule.format2.trim().is_empty();

    let first = cell_text(row.cell(&rule.column1)?);
    let second = if has_second {
        cell_text(row.cell(&rule.column2)?)
    } else {
        String::new()
    };

    let value = format!("{first}{FORMAT_JOIN}{second}");
    let format = format!("{}{FORMAT_JOIN}{}", rule.format1, rule.format2);

    parse_exact_utc(&value, &format)
}

fn cell_text(cell: &Option<Value>) -> String {
    cell.as_ref().map(Value::to_string).unwrap_or_default()
}

/// Strict parse; date-only formats resolve to midnight. The parsed
/// wall-clock time is interpreted as UTC.
fn parse_exact_utc(value: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
        return Some(datetime.and_utc());
    }
    NaiveDate::parse_from_str(value, format)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Default heuristic: a case-insensitive "Timestamp" column, integer
/// epoch milliseconds or float epoch seconds.
fn resolve_default(row: &Row) -> Option<DateTime<Utc>> {
    let key = row.find_key_ignore_case("Timestamp")?.to_string();
    let value = row.cell(&key)?.as_ref()?;

    let millis = match value {
        Value::Int(v) => *v,
        Value::UInt(v) => i64::try_from(*v).ok()?,
        // NaN would cast to 0 and masquerade as the epoch
        Value::Float(v) if v.is_nan() => return None,
        Value::Float(v) => (v * 1000.0) as i64,
        _ => return None,
    };

    Utc.timestamp_millis_opt(millis).single()
}
