//! The structured record written once per logged request.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use http::StatusCode;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::locals::Value;

// ── Level ─────────────────────────────────────────────────────────────────────

/// Severity of a request record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// `Warn` for 4xx, `Error` for 5xx and above, `Info` for everything else.
    pub fn for_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400..=499 => Self::Warn,
            500..=u16::MAX => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info  => "info",
            Self::Warn  => "warn",
            Self::Error => "error",
        }
    }
}

impl From<Level> for tracing::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Info  => tracing::Level::INFO,
            Level::Warn  => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Field ─────────────────────────────────────────────────────────────────────

/// A typed value as the sink receives it.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Str(String),
    Strs(Vec<String>),
    I64(i64),
    U64(u64),
    F64(f64),
    Duration(Duration),
    Bool(bool),
    /// Rendered error messages.
    Errors(Vec<String>),
    Object(Vec<(String, Field)>),
}

impl From<&Value> for Field {
    fn from(value: &Value) -> Self {
        match value {
            Value::Str(v)      => Self::Str(v.clone()),
            Value::Strs(v)     => Self::Strs(v.clone()),
            Value::I64(v)      => Self::I64(*v),
            Value::U64(v)      => Self::U64(*v),
            Value::F64(v)      => Self::F64(*v),
            Value::Duration(v) => Self::Duration(*v),
            Value::Bool(v)     => Self::Bool(*v),
            Value::Errors(v)   => Self::Errors(v.iter().map(|e| e.to_string()).collect()),
            Value::Object(v)   => Self::Object(v.iter().map(|(k, v)| (k.clone(), v.into())).collect()),
            Value::Display(v)  => Self::Str(v.to_string()),
            Value::Opaque(v)   => Self::Str(format!("<{}>", v.type_name())),
        }
    }
}

/// Durations serialize as fractional milliseconds.
impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(v)      => serializer.serialize_str(v),
            Self::Strs(v)     => v.serialize(serializer),
            Self::I64(v)      => serializer.serialize_i64(*v),
            Self::U64(v)      => serializer.serialize_u64(*v),
            Self::F64(v)      => serializer.serialize_f64(*v),
            Self::Duration(v) => serializer.serialize_f64(millis(*v)),
            Self::Bool(v)     => serializer.serialize_bool(*v),
            Self::Errors(v)   => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for e in v {
                    seq.serialize_element(e)?;
                }
                seq.end()
            }
            Self::Object(v)   => serialize_fields(v, serializer.serialize_map(Some(v.len()))?)?.end(),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

fn serialize_fields<M: SerializeMap>(fields: &[(String, Field)], mut map: M) -> Result<M, M::Error> {
    for (k, v) in fields {
        map.serialize_entry(k, v)?;
    }
    Ok(map)
}

// ── Record ────────────────────────────────────────────────────────────────────

/// One request's log record. Built after the chain returns, written once,
/// then dropped.
#[derive(Clone, Debug)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    /// The chain error's message, empty when the chain succeeded.
    pub message: String,
    /// Fields in the order they were added.
    pub fields: Vec<(String, Field)>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self { time: Utc::now(), level, message: message.into(), fields: Vec::new() }
    }

    pub fn push(&mut self, key: impl Into<String>, field: Field) {
        self.fields.push((key.into(), field));
    }

    /// First field named `key`.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        match self.field(key)? {
            Field::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// `{"level":…,"time":…,<fields>…,"message":…}`
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 3))?;
        map.serialize_entry("level", self.level.as_str())?;
        map.serialize_entry("time", &self.time.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        let mut map = serialize_fields(&self.fields, map)?;
        map.serialize_entry("message", &self.message)?;
        map.end()
    }
}
