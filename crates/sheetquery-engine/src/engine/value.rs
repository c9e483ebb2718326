//! Cell values and column types for loaded tables.
//!
//! - [`CellValue`] - One typed cell (number, text, boolean, timestamp, or missing)
//! - [`ColumnType`] - The type inferred for a whole column

use chrono::NaiveDateTime;
use rhai::Dynamic;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// The value stored in one cell of a table.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Missing,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Numeric view used by aggregations. Booleans count as 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Missing => "missing",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Bool(_) => "bool",
            CellValue::DateTime(_) => "datetime",
        }
    }

    /// Convert into a Rhai value. Missing cells become `()`.
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            CellValue::Missing => Dynamic::UNIT,
            CellValue::Number(n) => Dynamic::from_float(*n),
            CellValue::Text(s) => Dynamic::from(s.clone()),
            CellValue::Bool(b) => Dynamic::from_bool(*b),
            CellValue::DateTime(dt) => Dynamic::from(*dt),
        }
    }

    /// Convert a Rhai value back into a cell. Returns `None` for values that
    /// have no cell representation (arrays, maps, frames).
    pub fn from_dynamic(value: &Dynamic) -> Option<CellValue> {
        if value.is_unit() {
            return Some(CellValue::Missing);
        }
        if let Ok(n) = value.as_float() {
            return Some(CellValue::Number(n));
        }
        if let Ok(n) = value.as_int() {
            return Some(CellValue::Number(n as f64));
        }
        if let Ok(b) = value.as_bool() {
            return Some(CellValue::Bool(b));
        }
        if let Ok(c) = value.as_char() {
            return Some(CellValue::Text(c.to_string()));
        }
        if value.is_string() {
            return value.clone().into_string().ok().map(CellValue::Text);
        }
        value
            .clone()
            .try_cast::<NaiveDateTime>()
            .map(CellValue::DateTime)
    }

    /// Total order used for sorting: missing sorts last, then numbers,
    /// booleans, timestamps, and text.
    pub fn sort_cmp(&self, other: &CellValue) -> Ordering {
        fn rank(v: &CellValue) -> u8 {
            match v {
                CellValue::Number(_) => 0,
                CellValue::Bool(_) => 1,
                CellValue::DateTime(_) => 2,
                CellValue::Text(_) => 3,
                CellValue::Missing => 4,
            }
        }
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    /// Key used for grouping and `unique`. Numbers are keyed by display
    /// form so that `1` and `1.0` group together.
    pub fn group_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => write!(f, "NaN"),
            CellValue::Number(n) => write!(f, "{}", super::format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            CellValue::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
        }
    }
}

/// Render a timestamp the way result coercion reports it.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// The type inferred for a column from its non-missing cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Empty,
    Number,
    Text,
    Bool,
    DateTime,
    Mixed,
}

impl ColumnType {
    /// Infer a column type. Missing cells are ignored; a column of only
    /// missing cells is `Empty`.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> ColumnType {
        let mut inferred = ColumnType::Empty;
        for value in values {
            let this = match value {
                CellValue::Missing => continue,
                CellValue::Number(_) => ColumnType::Number,
                CellValue::Text(_) => ColumnType::Text,
                CellValue::Bool(_) => ColumnType::Bool,
                CellValue::DateTime(_) => ColumnType::DateTime,
            };
            inferred = match inferred {
                ColumnType::Empty => this,
                current if current == this => current,
                _ => return ColumnType::Mixed,
            };
        }
        inferred
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Empty => "empty",
            ColumnType::Number => "number",
            ColumnType::Text => "text",
            ColumnType::Bool => "bool",
            ColumnType::DateTime => "datetime",
            ColumnType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
