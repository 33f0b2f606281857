//! Conversions between [`Value`] and PostgreSQL's binary wire types.
//!
//! Parameters are coerced to the types the server declared for the prepared
//! statement, so `25` bound to `$2::int` goes out as a 4-byte INT4.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::net::IpAddr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{ProbeError, ProbeResult};
use crate::models::{normalize_integer, Record, Value};

type BoxError = Box<dyn Error + Sync + Send>;

/// A parameter already coerced to its declared PostgreSQL type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParam {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Oid(u32),
    Float32(f32),
    Float64(f64),
    Text(String),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl PgParam {
    /// Coerce `value` for placeholder `$position` of type `ty`.
    pub(crate) fn for_type(value: &Value, ty: &Type, position: usize) -> ProbeResult<Self> {
        if value.is_null() {
            return Ok(Self::Null);
        }

        let coerced = match *ty {
            Type::BOOL => value.as_bool().map(Self::Bool),
            Type::INT2 => value.as_i64().and_then(|v| i16::try_from(v).ok()).map(Self::Int16),
            Type::INT4 => value.as_i64().and_then(|v| i32::try_from(v).ok()).map(Self::Int32),
            Type::INT8 => value.as_i64().map(Self::Int64),
            Type::OID => value.as_i64().and_then(|v| u32::try_from(v).ok()).map(Self::Oid),
            Type::FLOAT4 => value.as_f64().map(|v| Self::Float32(v as f32)),
            Type::FLOAT8 => value.as_f64().map(Self::Float64),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                match value {
                    Value::String(s) => Some(Self::Text(s.clone())),
                    Value::List(_) | Value::Map(_) => None,
                    scalar => Some(Self::Text(scalar.to_string())),
                }
            }
            Type::JSON | Type::JSONB => serde_json::to_value(value).ok().map(Self::Json),
            Type::UUID => value.as_str().and_then(|s| Uuid::parse_str(s).ok()).map(Self::Uuid),
            Type::TIMESTAMPTZ => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| Self::TimestampTz(ts.with_timezone(&Utc))),
            Type::TIMESTAMP => value.as_str().and_then(parse_naive_timestamp).map(Self::Timestamp),
            Type::DATE => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(Self::Date),
            Type::TIME => value
                .as_str()
                .and_then(|s| NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok())
                .map(Self::Time),
            _ => None,
        };

        coerced.ok_or_else(|| {
            ProbeError::query(
                format!(
                    "Cannot bind {} value {value} to parameter ${position} of type {}",
                    value.type_name(),
                    ty.name()
                ),
                None,
                Some(format!("Cast the placeholder explicitly, e.g. ${position}::text")),
                None,
                None,
            )
        })
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

impl ToSql for PgParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Int16(v) => v.to_sql(ty, out),
            Self::Int32(v) => v.to_sql(ty, out),
            Self::Int64(v) => v.to_sql(ty, out),
            Self::Oid(v) => v.to_sql(ty, out),
            Self::Float32(v) => v.to_sql(ty, out),
            Self::Float64(v) => v.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::Json(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::TimestampTz(v) => v.to_sql(ty, out),
            Self::Date(v) => v.to_sql(ty, out),
            Self::Time(v) => v.to_sql(ty, out),
        }
    }

    // Coercion already matched the declared type
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Coerce every value against the statement's declared parameter types.
pub(crate) fn bind_params(values: &[Value], types: &[Type]) -> ProbeResult<Vec<PgParam>> {
    if values.len() != types.len() {
        return Err(ProbeError::query_message(format!(
            "Statement expects {} parameter(s) but {} were supplied",
            types.len(),
            values.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .enumerate()
        .map(|(i, (value, ty))| PgParam::for_type(value, ty, i + 1))
        .collect()
}

/// Arbitrary-precision NUMERIC, decoded to its exact decimal text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PgNumeric(pub String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary NUMERIC layout: header of ndigits, weight, sign and
/// dscale, followed by base-10000 digit groups. Group `i` carries weight
/// `weight - i`.
fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("numeric value shorter than its header".into());
    }
    let ndigits = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = u16::from_be_bytes([raw[6], raw[7]]) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    let body = raw.get(8..8 + ndigits * 2).ok_or("numeric value shorter than its digit count")?;
    let digits: Vec<u16> =
        body.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
    let group = |idx: i32| -> u16 {
        usize::try_from(idx).ok().and_then(|i| digits.get(i).copied()).unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for idx in 1..=weight {
            out.push_str(&format!("{:04}", group(idx)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        for k in 1..=dscale.div_ceil(4) as i32 {
            fraction.push_str(&format!("{:04}", group(weight + k)));
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Interval in its binary layout: microseconds, days, months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PgInterval {
    pub micros: i64,
    pub days: i32,
    pub months: i32,
}

impl<'a> FromSql<'a> for PgInterval {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let raw: &[u8; 16] = raw.try_into().map_err(|_| "interval value is not 16 bytes")?;
        let (micros, rest) = raw.split_at(8);
        let (days, months) = rest.split_at(4);
        Ok(PgInterval {
            micros: i64::from_be_bytes(micros.try_into()?),
            days: i32::from_be_bytes(days.try_into()?),
            months: i32::from_be_bytes(months.try_into()?),
        })
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

impl fmt::Display for PgInterval {
    /// ISO 8601 duration, as PostgreSQL prints it with `IntervalStyle = iso_8601`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.micros == 0 && self.days == 0 && self.months == 0 {
            return f.write_str("PT0S");
        }

        f.write_str("P")?;
        let (years, months) = (self.months / 12, self.months % 12);
        if years != 0 {
            write!(f, "{years}Y")?;
        }
        if months != 0 {
            write!(f, "{months}M")?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.micros == 0 {
            return Ok(());
        }

        f.write_str("T")?;
        let hours = self.micros / 3_600_000_000;
        let minutes = self.micros % 3_600_000_000 / 60_000_000;
        let sub_minute = self.micros % 60_000_000;
        if hours != 0 {
            write!(f, "{hours}H")?;
        }
        if minutes != 0 {
            write!(f, "{minutes}M")?;
        }
        if sub_minute != 0 {
            let sign = if sub_minute < 0 { "-" } else { "" };
            let abs = sub_minute.unsigned_abs();
            let (secs, frac) = (abs / 1_000_000, abs % 1_000_000);
            if frac == 0 {
                write!(f, "{sign}{secs}S")?;
            } else {
                let frac = format!("{frac:06}");
                write!(f, "{sign}{secs}.{}S", frac.trim_end_matches('0'))?;
            }
        }
        Ok(())
    }
}

/// `inet`/`cidr` address with its netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PgInet {
    pub addr: IpAddr,
    pub bits: u8,
    pub is_cidr: bool,
}

impl<'a> FromSql<'a> for PgInet {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let [family, bits, is_cidr, _len, addr @ ..] = raw else {
            return Err("inet value shorter than its header".into());
        };
        let addr = match (*family, addr.len()) {
            (PGSQL_AF_INET, 4) => IpAddr::from(<[u8; 4]>::try_from(addr)?),
            (PGSQL_AF_INET6, 16) => IpAddr::from(<[u8; 16]>::try_from(addr)?),
            (family, len) => {
                return Err(format!("unknown inet family {family} with {len} address bytes").into())
            }
        };
        Ok(PgInet {
            addr,
            bits: *bits,
            is_cidr: *is_cidr != 0,
        })
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::INET | Type::CIDR)
    }
}

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

impl fmt::Display for PgInet {
    /// Host addresses print bare; networks and `cidr` values keep the mask.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = if self.addr.is_ipv4() { 32 } else { 128 };
        if self.is_cidr || self.bits != full {
            write!(f, "{}/{}", self.addr, self.bits)
        } else {
            write!(f, "{}", self.addr)
        }
    }
}

/// Undecoded column bytes, borrowed from the row.
struct PgRaw<'a>(&'a [u8]);

impl<'a> FromSql<'a> for PgRaw<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(PgRaw(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// `\x`-prefixed hex, the way PostgreSQL prints bytea.
pub(crate) fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn decode<'a, T: FromSql<'a>>(ty: &Type, raw: &'a [u8]) -> Result<T, BoxError> {
    T::from_sql(ty, raw)
}

/// Decode a one-dimensional array, mapping each present element with `f`.
fn list<'a, T: FromSql<'a>>(
    ty: &Type,
    raw: &'a [u8],
    f: impl Fn(T) -> Value,
) -> Result<Value, BoxError> {
    let items = Vec::<Option<T>>::from_sql(ty, raw)?;
    Ok(Value::List(items.into_iter().map(|v| v.map(&f).unwrap_or(Value::Null)).collect()))
}

fn text(bytes: &[u8]) -> Result<Value, BoxError> {
    Ok(Value::String(std::str::from_utf8(bytes)?.to_string()))
}

/// Decode a non-null binary value of type `ty`.
fn decode_value(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    let value = match *ty {
        Type::BOOL => Value::Bool(decode(ty, raw)?),
        Type::CHAR => Value::from(i32::from(decode::<i8>(ty, raw)?)),

        Type::INT2 => Value::from(decode::<i16>(ty, raw)?),
        Type::INT4 => Value::from(decode::<i32>(ty, raw)?),
        Type::INT8 => normalize_integer(decode(ty, raw)?),
        Type::OID => Value::from(decode::<u32>(ty, raw)?),

        Type::FLOAT4 => Value::Float(f64::from(decode::<f32>(ty, raw)?)),
        Type::FLOAT8 => Value::Float(decode(ty, raw)?),
        Type::NUMERIC => Value::String(decode::<PgNumeric>(ty, raw)?.0),

        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Value::String(decode(ty, raw)?)
        }

        Type::JSON | Type::JSONB => Value::from_json(decode(ty, raw)?),
        Type::UUID => Value::String(decode::<Uuid>(ty, raw)?.to_string()),

        Type::TIMESTAMPTZ => Value::String(decode::<DateTime<Utc>>(ty, raw)?.to_rfc3339()),
        Type::TIMESTAMP => Value::String(decode::<NaiveDateTime>(ty, raw)?.to_string()),
        Type::DATE => Value::String(decode::<NaiveDate>(ty, raw)?.to_string()),
        Type::TIME => Value::String(decode::<NaiveTime>(ty, raw)?.to_string()),
        Type::INTERVAL => Value::String(decode::<PgInterval>(ty, raw)?.to_string()),

        Type::INET | Type::CIDR => Value::String(decode::<PgInet>(ty, raw)?.to_string()),
        Type::BYTEA => Value::String(hex_bytes(raw)),

        Type::BOOL_ARRAY => list(ty, raw, Value::Bool)?,
        Type::INT2_ARRAY => list::<i16>(ty, raw, Value::from)?,
        Type::INT4_ARRAY => list::<i32>(ty, raw, Value::from)?,
        Type::INT8_ARRAY => list(ty, raw, normalize_integer)?,
        Type::OID_ARRAY => list::<u32>(ty, raw, Value::from)?,
        Type::FLOAT4_ARRAY => list::<f32>(ty, raw, |v| Value::Float(f64::from(v)))?,
        Type::FLOAT8_ARRAY => list(ty, raw, Value::Float)?,
        Type::NUMERIC_ARRAY => list::<PgNumeric>(ty, raw, |n| Value::String(n.0))?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY | Type::NAME_ARRAY => {
            list(ty, raw, Value::String)?
        }
        Type::JSON_ARRAY | Type::JSONB_ARRAY => list(ty, raw, Value::from_json)?,
        Type::UUID_ARRAY => list::<Uuid>(ty, raw, |v| Value::String(v.to_string()))?,
        Type::TIMESTAMPTZ_ARRAY => {
            list::<DateTime<Utc>>(ty, raw, |v| Value::String(v.to_rfc3339()))?
        }
        Type::TIMESTAMP_ARRAY => list::<NaiveDateTime>(ty, raw, |v| Value::String(v.to_string()))?,
        Type::DATE_ARRAY => list::<NaiveDate>(ty, raw, |v| Value::String(v.to_string()))?,
        Type::INTERVAL_ARRAY => list::<PgInterval>(ty, raw, |v| Value::String(v.to_string()))?,
        Type::BYTEA_ARRAY => list::<&[u8]>(ty, raw, |v| Value::String(hex_bytes(v)))?,

        _ => return decode_extension(ty, raw),
    };
    Ok(value)
}

/// Types outside the built-in set. Enums and text-like extensions send their
/// label as UTF-8 and domains send their base type's layout; everything else
/// keeps its exact bytes as hex.
fn decode_extension(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    match ty.kind() {
        Kind::Enum(_) => text(raw),
        Kind::Domain(base) => decode_value(base, raw),
        Kind::Simple if TEXT_LIKE_EXTENSIONS.contains(&ty.name()) => text(raw),
        _ => {
            tracing::debug!(
                type_name = %ty.name(),
                oid = ty.oid(),
                "Returning column bytes as hex"
            );
            Ok(Value::String(hex_bytes(raw)))
        }
    }
}

/// Extension types whose binary form is their text form.
const TEXT_LIKE_EXTENSIONS: &[&str] = &["citext", "ltree", "lquery"];

/// Decode one column of `row` into a normalized [`Value`].
fn decode_column(row: &Row, idx: usize) -> ProbeResult<Value> {
    let column = &row.columns()[idx];
    let raw = row.try_get::<_, Option<PgRaw>>(idx).map_err(|e| {
        ProbeError::query_message(format!("Failed to read column '{}': {e}", column.name()))
    })?;

    match raw {
        None => Ok(Value::Null),
        Some(PgRaw(bytes)) => decode_value(column.type_(), bytes).map_err(|e| {
            ProbeError::query_message(format!(
                "Failed to decode column '{}' of type {}: {e}",
                column.name(),
                column.type_().name()
            ))
        }),
    }
}

/// Record keys for the given column names. Repeated names get a numeric
/// suffix (`x`, `x_2`, `x_3`) so no column overwrites another.
pub(crate) fn unique_column_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.to_string();
            let mut n = 1;
            while !taken.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{name}_{n}");
            }
            candidate
        })
        .collect()
}

/// Decode a full row into a record keyed by `columns`, which must come from
/// [`unique_column_names`] over the same statement.
pub(crate) fn row_to_record(row: &Row, columns: &[String]) -> ProbeResult<Record> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, name)| Ok((name.clone(), decode_column(row, idx)?)))
        .collect()
}
