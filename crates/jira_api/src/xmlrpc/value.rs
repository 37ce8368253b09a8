//! XML-RPC value model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::util::parse_date;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    Double(f64),
    DateTime(DateTime<Utc>),
    Base64(Vec<u8>),
    /// Members in the order they appear on the wire.
    Struct(Vec<(String, Value)>),
    Array(Vec<Value>),
    Nil,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|value| i32::try_from(value).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Base64(bytes) => Some(bytes),
            Value::String(text) => Some(text.into_bytes()),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Looks up a struct member.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_struct()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::as_str).map(str::to_string)
    }

    /// Dates arrive either as native date values or as epoch seconds.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(date) => Some(*date),
            Value::Int(seconds) => parse_date(*seconds),
            _ => None,
        }
    }

    /// Textual form used when storing values as ticket attributes.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Int(value) => value.to_string(),
            Value::Bool(value) => if *value { "1" } else { "0" }.to_string(),
            Value::String(value) => value.clone(),
            Value::Double(value) => value.to_string(),
            Value::DateTime(value) => value.timestamp().to_string(),
            Value::Base64(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Value::Struct(_) | Value::Array(_) => format!("{self:?}"),
            Value::Nil => String::new(),
        }
    }

    pub fn struct_of<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Struct(
            members
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(map: BTreeMap<String, String>) -> Self {
        Value::Struct(
            map.into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        )
    }
}
