//! Result coercion: turning whatever a query left in `x` into a value a
//! transport can carry.
//!
//! Scalars map one-to-one. Structured results (series, frames, arrays, maps)
//! are rendered to text, which loses their structure.

use chrono::NaiveDateTime;
use rhai::Map;
use serde::Serialize;

use super::eval::ResultValue;
use super::frame::{DataFrame, Series};
use super::value::format_datetime;
use super::Dynamic;

/// A primitive value safe to hand to any transport.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransportValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl TransportValue {
    /// Plain-text form for terminal output.
    pub fn to_display(&self) -> String {
        match self {
            TransportValue::Null => "null".to_string(),
            TransportValue::Bool(b) => b.to_string(),
            TransportValue::Number(n) => format_number(*n),
            TransportValue::Text(s) => s.clone(),
        }
    }
}

/// Coerce an evaluation result. An unbound `x` becomes the empty string.
pub fn coerce(result: &ResultValue) -> TransportValue {
    match result {
        ResultValue::Unbound => TransportValue::Text(String::new()),
        ResultValue::Bound(value) => coerce_dynamic(value),
    }
}

/// Coerce a single Rhai value.
pub fn coerce_dynamic(value: &Dynamic) -> TransportValue {
    if value.is_unit() {
        TransportValue::Null
    } else if let Ok(b) = value.as_bool() {
        TransportValue::Bool(b)
    } else if let Ok(n) = value.as_int() {
        TransportValue::Number(n as f64)
    } else if let Ok(n) = value.as_float() {
        if n.is_finite() {
            TransportValue::Number(n)
        } else {
            TransportValue::Null
        }
    } else if let Ok(c) = value.as_char() {
        TransportValue::Text(c.to_string())
    } else if value.is_string() {
        TransportValue::Text(value.clone().into_string().unwrap_or_default())
    } else {
        TransportValue::Text(format_dynamic(value))
    }
}

/// Render any Rhai value as text, including the table types.
pub fn format_dynamic(value: &Dynamic) -> String {
    if value.is_unit() {
        String::new()
    } else if let Ok(n) = value.as_float() {
        format_number(n)
    } else if let Ok(n) = value.as_int() {
        n.to_string()
    } else if let Ok(b) = value.as_bool() {
        b.to_string()
    } else if let Ok(s) = value.clone().into_string() {
        s
    } else if let Some(series) = value.clone().try_cast::<Series>() {
        series.render()
    } else if let Some(frame) = value.clone().try_cast::<DataFrame>() {
        frame.table().render()
    } else if let Some(dt) = value.clone().try_cast::<NaiveDateTime>() {
        format_datetime(&dt)
    } else if let Ok(items) = value.clone().into_array() {
        let items: Vec<String> = items.iter().map(format_element).collect();
        format!("[{}]", items.join(", "))
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        let entries: Vec<String> = map
            .iter()
            .map(|(key, item)| format!("{:?}: {}", key.as_str(), format_element(item)))
            .collect();
        format!("#{{{}}}", entries.join(", "))
    } else {
        value.to_string()
    }
}

/// An array or map element: strings are quoted and unit is spelled out.
fn format_element(value: &Dynamic) -> String {
    if value.is_unit() {
        "()".to_string()
    } else if let Ok(s) = value.clone().into_string() {
        format!("{:?}", s)
    } else {
        format_dynamic(value)
    }
}

/// Format a number for display: integral values print without a fraction.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}
