use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, Value as DuckValue};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::fmt;

/// Native value produced by the engine.
///
/// Values stay in their native form through the executor; string formatting
/// happens only when a result is rendered (JSON response, CSV export).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    HugeInt(i128),
    Real(f64),
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Interval { months: i32, days: i32, nanos: i64 },
    Blob(Vec<u8>),
    List(Vec<Value>),
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    DateTime::from_timestamp(i64::from(days) * 86_400, 0).map(|dt| dt.date_naive())
}

fn time_from_micros(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

impl From<DuckValue> for Value {
    fn from(v: DuckValue) -> Self {
        match v {
            DuckValue::Null => Value::Null,
            DuckValue::Boolean(b) => Value::Boolean(b),
            DuckValue::TinyInt(i) => Value::Integer(i.into()),
            DuckValue::SmallInt(i) => Value::Integer(i.into()),
            DuckValue::Int(i) => Value::Integer(i.into()),
            DuckValue::BigInt(i) => Value::Integer(i),
            DuckValue::HugeInt(i) => Value::HugeInt(i),
            DuckValue::UTinyInt(u) => Value::Unsigned(u.into()),
            DuckValue::USmallInt(u) => Value::Unsigned(u.into()),
            DuckValue::UInt(u) => Value::Unsigned(u.into()),
            DuckValue::UBigInt(u) => Value::Unsigned(u),
            DuckValue::Float(f) => Value::Real(f.into()),
            DuckValue::Double(f) => Value::Real(f),
            DuckValue::Decimal(d) => Value::Decimal(d.to_string()),
            DuckValue::Text(s) => Value::Text(s),
            DuckValue::Enum(s) => Value::Text(s),
            DuckValue::Blob(b) => Value::Blob(b),
            DuckValue::Date32(days) => date_from_days(days)
                .map(Value::Date)
                .unwrap_or(Value::Integer(days.into())),
            DuckValue::Time64(unit, raw) => time_from_micros(to_micros(unit, raw))
                .map(Value::Time)
                .unwrap_or(Value::Integer(raw)),
            DuckValue::Timestamp(unit, raw) => DateTime::from_timestamp_micros(to_micros(unit, raw))
                .map(|dt| Value::Timestamp(dt.naive_utc()))
                .unwrap_or(Value::Integer(raw)),
            DuckValue::Interval { months, days, nanos } => Value::Interval {
                months,
                days,
                nanos,
            },
            DuckValue::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            other => {
                tracing::debug!("Converting nested engine value to text: {:?}", other);
                Value::Text(format!("{:?}", other))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Unsigned(u) => write!(f, "{}", u),
            Value::HugeInt(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(t) => write!(f, "{}", t),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Interval {
                months,
                days,
                nanos,
            } => write!(f, "{} months {} days {} us", months, days, nanos / 1_000),
            Value::Blob(b) => write!(f, "<BLOB {} bytes>", b.len()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Unsigned(u) => serializer.serialize_u64(*u),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Text(t) => serializer.serialize_str(t),
            // base64 keeps binary payloads JSON-safe
            Value::Blob(b) => serializer.serialize_str(&general_purpose::STANDARD.encode(b)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            // Precision-sensitive and temporal values travel as text
            other => serializer.collect_str(other),
        }
    }
}

/// Query execution result
///
/// `rows` holds at most the executor's row cap; `total_rows` is the true
/// size of the result set.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_engine_temporals() {
        assert_eq!(
            Value::from(DuckValue::Date32(19_723)),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(
            Value::from(DuckValue::Time64(TimeUnit::Microsecond, 3_661_000_000)),
            Value::Time(NaiveTime::from_hms_opt(1, 1, 1).unwrap())
        );
        let ts = Value::from(DuckValue::Timestamp(TimeUnit::Second, 1_704_067_200));
        assert_eq!(ts.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn serializes_to_native_json() {
        let row = vec![
            Value::Null,
            Value::Integer(-3),
            Value::Real(1.5),
            Value::Text("{\"a\":1}".to_string()),
            Value::Blob(vec![0xde, 0xad]),
            Value::HugeInt(170141183460469231731687303715884105727),
            Value::List(vec![Value::Integer(1), Value::Boolean(true)]),
        ];

        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([
                null,
                -3,
                1.5,
                "{\"a\":1}",
                "3q0=",
                "170141183460469231731687303715884105727",
                [1, true]
            ])
        );
    }
}
