//! Per-request key/value store.
//!
//! Handlers and middleware put values here while a request travels down the
//! chain; the request log reads them back once the chain returns. Values are
//! stored as a [`Value`], a closed set of shapes a structured log sink knows
//! how to print, plus two escape hatches: [`Value::display`] for anything
//! printable and [`Value::opaque`] for everything else.
//!
//! ```rust
//! use reqlog::{Request, Value};
//!
//! let req = Request::builder().uri("/").build();
//! req.locals().insert("username", "alice");
//! req.locals().insert("attempts", 3_i64);
//!
//! assert_eq!(req.locals().get("username"), Some(Value::Str("alice".into())));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// ── Locals ────────────────────────────────────────────────────────────────────

/// Shared handle to one request's key/value store.
///
/// Cloning is cheap (one `Arc` increment) and every clone sees the same
/// entries. A middleware keeps a clone before handing the request on, which
/// is how it observes values set further down the chain.
#[derive(Clone, Default)]
pub struct Locals {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the previous value if any.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    // A panicking handler must not take logging down with it.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.lock().iter()).finish()
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A value stored in [`Locals`].
#[derive(Clone)]
pub enum Value {
    Str(String),
    Strs(Vec<String>),
    I64(i64),
    U64(u64),
    F64(f64),
    Duration(Duration),
    Bool(bool),
    Errors(Vec<Arc<dyn std::error::Error + Send + Sync>>),
    /// Nested key/value pairs, kept in insertion order.
    Object(Vec<(String, Value)>),
    /// Anything printable; logged through its `Display` output.
    Display(Arc<dyn fmt::Display + Send + Sync>),
    /// Anything else; logged as `<type name>`.
    Opaque(Opaque),
}

impl Value {
    pub fn display(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        Self::Display(Arc::new(value))
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Opaque { type_name: std::any::type_name::<T>(), value: Arc::new(value) })
    }

    pub fn errors<I, E>(errors: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Errors(
            errors.into_iter()
                .map(|e| Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>)
                .collect(),
        )
    }

    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the inner value of an [`Opaque`] entry as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(o) => o.value.downcast_ref(),
            _ => None,
        }
    }
}

/// A value of a type the log sink has no structured shape for.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v)      => f.debug_tuple("Str").field(v).finish(),
            Self::Strs(v)     => f.debug_tuple("Strs").field(v).finish(),
            Self::I64(v)      => f.debug_tuple("I64").field(v).finish(),
            Self::U64(v)      => f.debug_tuple("U64").field(v).finish(),
            Self::F64(v)      => f.debug_tuple("F64").field(v).finish(),
            Self::Duration(v) => f.debug_tuple("Duration").field(v).finish(),
            Self::Bool(v)     => f.debug_tuple("Bool").field(v).finish(),
            Self::Errors(v)   => f.debug_list().entries(v.iter().map(|e| e.to_string())).finish(),
            Self::Object(v)   => f.debug_tuple("Object").field(v).finish(),
            Self::Display(v)  => f.debug_tuple("Display").field(&v.to_string()).finish(),
            Self::Opaque(o)   => write!(f, "Opaque(<{}>)", o.type_name),
        }
    }
}

/// Structural equality. `Errors` and `Display` compare by rendered text,
/// `Opaque` by type name only.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b))           => a == b,
            (Self::Strs(a), Self::Strs(b))         => a == b,
            (Self::I64(a), Self::I64(b))           => a == b,
            (Self::U64(a), Self::U64(b))           => a == b,
            (Self::F64(a), Self::F64(b))           => a == b,
            (Self::Duration(a), Self::Duration(b)) => a == b,
            (Self::Bool(a), Self::Bool(b))         => a == b,
            (Self::Errors(a), Self::Errors(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_string() == y.to_string())
            }
            (Self::Object(a), Self::Object(b))     => a == b,
            (Self::Display(a), Self::Display(b))   => a.to_string() == b.to_string(),
            (Self::Opaque(a), Self::Opaque(b))     => a.type_name == b.type_name,
            _ => false,
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::Str(v.to_owned()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::Str(v) }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self { Self::Strs(v) }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self { Self::Strs(v.into_iter().map(str::to_owned).collect()) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Self::I64(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Self::I64(v.into()) }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self { Self::U64(v) }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self { Self::U64(v.into()) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Self::F64(v) }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self { Self::Duration(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Self::Bool(v) }
}
