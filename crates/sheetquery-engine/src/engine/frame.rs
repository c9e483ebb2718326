//! Script-facing handles over tables: [`DataFrame`] and [`Series`].
//!
//! These are the values a query sees. A `DataFrame` shares its table through
//! an `Arc` and copies it on first write, so changes a query makes to `df`
//! never reach the table the caller loaded.

use std::collections::HashMap;
use std::sync::Arc;

use super::table::{Table, TableError};
use super::value::CellValue;

/// Element-wise arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
        }
    }
}

/// Element-wise comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn test(self, left: &CellValue, right: &CellValue) -> bool {
        use std::cmp::Ordering;

        let ordering = match (left, right) {
            (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => Some(a.cmp(b)),
            (CellValue::Bool(a), CellValue::Bool(b)) => Some(a.cmp(b)),
            (CellValue::DateTime(a), CellValue::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        };
        // Missing or incomparable values only satisfy `!=`.
        let Some(ordering) = ordering else {
            return self == CmpOp::Ne;
        };
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Aggregation applied per group by [`DataFrame::group_by`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

impl Aggregation {
    pub fn parse(name: &str) -> Result<Aggregation, TableError> {
        match name {
            "sum" => Ok(Aggregation::Sum),
            "mean" => Ok(Aggregation::Mean),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "count" => Ok(Aggregation::Count),
            other => Err(TableError::Unsupported(format!(
                "unknown aggregation '{}' (expected sum, mean, min, max or count)",
                other
            ))),
        }
    }

    fn apply(self, series: &Series) -> Result<CellValue, TableError> {
        match self {
            Aggregation::Sum => series.sum().map(CellValue::Number),
            Aggregation::Mean => series.mean().map(CellValue::Number),
            Aggregation::Min => series.min(),
            Aggregation::Max => series.max(),
            Aggregation::Count => Ok(CellValue::Number(series.count() as f64)),
        }
    }
}

/// One named column of values, detached from its table.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    name: String,
    values: Vec<CellValue>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Series {
        Series {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<CellValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of non-missing values.
    pub fn count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_missing()).count()
    }

    pub fn null_count(&self) -> usize {
        self.len() - self.count()
    }

    /// Non-missing values as numbers; any text or timestamp is an error.
    pub fn numbers(&self) -> Result<Vec<f64>, TableError> {
        let mut out = Vec::with_capacity(self.values.len());
        for value in &self.values {
            if value.is_missing() {
                continue;
            }
            match value.as_number() {
                Some(n) => out.push(n),
                None => {
                    return Err(TableError::NotNumeric {
                        name: self.name.clone(),
                        found: value.type_name(),
                    });
                }
            }
        }
        Ok(out)
    }

    pub fn sum(&self) -> Result<f64, TableError> {
        Ok(self.numbers()?.iter().sum())
    }

    pub fn mean(&self) -> Result<f64, TableError> {
        let numbers = self.numbers()?;
        if numbers.is_empty() {
            return Ok(f64::NAN);
        }
        Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }

    pub fn median(&self) -> Result<f64, TableError> {
        let mut numbers = self.numbers()?;
        if numbers.is_empty() {
            return Ok(f64::NAN);
        }
        numbers.sort_by(|a, b| a.total_cmp(b));
        let mid = numbers.len() / 2;
        if numbers.len() % 2 == 0 {
            Ok((numbers[mid - 1] + numbers[mid]) / 2.0)
        } else {
            Ok(numbers[mid])
        }
    }

    /// Sample variance (one degree of freedom removed).
    pub fn var(&self) -> Result<f64, TableError> {
        let numbers = self.numbers()?;
        if numbers.len() < 2 {
            return Ok(f64::NAN);
        }
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        let squares: f64 = numbers.iter().map(|n| (n - mean).powi(2)).sum();
        Ok(squares / (numbers.len() - 1) as f64)
    }

    pub fn std(&self) -> Result<f64, TableError> {
        Ok(self.var()?.sqrt())
    }

    pub fn min(&self) -> Result<CellValue, TableError> {
        self.extreme(std::cmp::Ordering::Less)
    }

    pub fn max(&self) -> Result<CellValue, TableError> {
        self.extreme(std::cmp::Ordering::Greater)
    }

    fn extreme(&self, wanted: std::cmp::Ordering) -> Result<CellValue, TableError> {
        let mut best: Option<&CellValue> = None;
        for value in self.values.iter().filter(|v| !v.is_missing()) {
            best = match best {
                None => Some(value),
                Some(current) => {
                    let same_kind = std::mem::discriminant(current) == std::mem::discriminant(value)
                        || (current.as_number().is_some() && value.as_number().is_some());
                    if !same_kind {
                        return Err(TableError::Unsupported(format!(
                            "cannot compare {} with {} in column '{}'",
                            current.type_name(),
                            value.type_name(),
                            self.name
                        )));
                    }
                    if value.sort_cmp(current) == wanted {
                        Some(value)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        Ok(best.cloned().unwrap_or(CellValue::Missing))
    }

    /// Distinct values in first-seen order, including one missing entry if
    /// any value is missing.
    pub fn unique(&self) -> Vec<CellValue> {
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        let mut saw_missing = false;
        for value in &self.values {
            if value.is_missing() {
                if !saw_missing {
                    saw_missing = true;
                    out.push(CellValue::Missing);
                }
                continue;
            }
            let key = format!("{}:{}", value.type_name(), value.group_key());
            if !seen.contains(&key) {
                seen.push(key);
                out.push(value.clone());
            }
        }
        out
    }

    /// Number of distinct non-missing values.
    pub fn nunique(&self) -> usize {
        self.unique().iter().filter(|v| !v.is_missing()).count()
    }

    /// Counts per distinct non-missing value, most frequent first; ties keep
    /// first-seen order.
    pub fn value_counts(&self) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in self.values.iter().filter(|v| !v.is_missing()) {
            let key = value.group_key();
            let entry = counts.entry(key.clone()).or_insert(0);
            if *entry == 0 {
                order.push(key);
            }
            *entry += 1;
        }
        let mut out: Vec<(String, usize)> = order
            .into_iter()
            .map(|key| {
                let count = counts[&key];
                (key, count)
            })
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }

    /// Value at `index`; negative indices count from the end.
    pub fn get(&self, index: i64) -> Result<CellValue, TableError> {
        let len = self.values.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs() as usize)
        } else {
            Some(index as usize).filter(|&i| i < len)
        };
        resolved
            .map(|i| self.values[i].clone())
            .ok_or(TableError::IndexOutOfRange { index, len })
    }

    pub fn head(&self, n: usize) -> Series {
        Series::new(self.name.clone(), self.values.iter().take(n).cloned().collect())
    }

    pub fn tail(&self, n: usize) -> Series {
        let skip = self.values.len().saturating_sub(n);
        Series::new(self.name.clone(), self.values[skip..].to_vec())
    }

    /// Element-wise arithmetic with another series of the same length.
    pub fn zip_with(&self, other: &Series, op: ArithOp) -> Result<Series, TableError> {
        if self.len() != other.len() {
            return Err(TableError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| arith(a, b, op, &self.name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Series::new(self.name.clone(), values))
    }

    /// Element-wise arithmetic with a scalar. `reversed` puts the scalar on
    /// the left-hand side.
    pub fn with_scalar(&self, scalar: f64, op: ArithOp, reversed: bool) -> Result<Series, TableError> {
        let scalar = CellValue::Number(scalar);
        let values = self
            .values
            .iter()
            .map(|v| {
                if reversed {
                    arith(&scalar, v, op, &self.name)
                } else {
                    arith(v, &scalar, op, &self.name)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Series::new(self.name.clone(), values))
    }

    /// Element-wise comparison against a scalar, producing a boolean series.
    pub fn compare(&self, rhs: &CellValue, op: CmpOp) -> Series {
        let values = self
            .values
            .iter()
            .map(|v| CellValue::Bool(op.test(v, rhs)))
            .collect();
        Series::new(self.name.clone(), values)
    }

    /// Combine two boolean series with `and` / `or`.
    pub fn combine_mask(&self, other: &Series, both: bool) -> Result<Series, TableError> {
        let left = self.mask()?;
        let right = other.mask()?;
        if left.len() != right.len() {
            return Err(TableError::LengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        let values = left
            .iter()
            .zip(&right)
            .map(|(a, b)| CellValue::Bool(if both { *a && *b } else { *a || *b }))
            .collect();
        Ok(Series::new(self.name.clone(), values))
    }

    /// The series as a row mask. Missing counts as `false`.
    pub fn mask(&self) -> Result<Vec<bool>, TableError> {
        self.values
            .iter()
            .map(|v| match v {
                CellValue::Bool(b) => Ok(*b),
                CellValue::Missing => Ok(false),
                _ => Err(TableError::NotBoolean(self.name.clone())),
            })
            .collect()
    }

    /// Render as `index value` lines followed by the series name.
    pub fn render(&self) -> String {
        let index_width = self.values.len().saturating_sub(1).to_string().len();
        let mut out = String::new();
        for (idx, value) in self.values.iter().enumerate() {
            out.push_str(&format!("{:<width$}    {}\n", idx, value, width = index_width));
        }
        out.push_str(&format!("Name: {}, Length: {}", self.name, self.values.len()));
        out
    }
}

fn arith(a: &CellValue, b: &CellValue, op: ArithOp, name: &str) -> Result<CellValue, TableError> {
    if a.is_missing() || b.is_missing() {
        return Ok(CellValue::Missing);
    }
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok(CellValue::Number(op.apply(x, y))),
        _ => {
            let found = if a.as_number().is_none() { a } else { b };
            Err(TableError::NotNumeric {
                name: name.to_string(),
                found: found.type_name(),
            })
        }
    }
}

/// A table as seen by a query.
#[derive(Clone, Debug)]
pub struct DataFrame {
    table: Arc<Table>,
}

impl DataFrame {
    pub fn new(table: Table) -> DataFrame {
        DataFrame {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Mutable access; clones the table if it is shared.
    pub fn table_mut(&mut self) -> &mut Table {
        Arc::make_mut(&mut self.table)
    }

    pub fn column(&self, name: &str) -> Result<Series, TableError> {
        self.table
            .column(name)
            .map(|c| Series::new(c.name.clone(), c.values.clone()))
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    /// Assign a column from a series (lengths must match) or a scalar
    /// (broadcast to every row).
    pub fn assign(&mut self, name: &str, values: ColumnSource) -> Result<(), TableError> {
        let values = match values {
            ColumnSource::Values(values) => values,
            ColumnSource::Scalar(value) => vec![value; self.table.row_count()],
        };
        self.table_mut().set_column(name, values)
    }

    /// Rows where `mask` is true.
    pub fn filter_mask(&self, mask: &Series) -> Result<DataFrame, TableError> {
        let flags = mask.mask()?;
        if flags.len() != self.table.row_count() {
            return Err(TableError::LengthMismatch {
                left: self.table.row_count(),
                right: flags.len(),
            });
        }
        let indices: Vec<usize> = flags
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        Ok(self.take_rows(&indices))
    }

    pub fn take_rows(&self, indices: &[usize]) -> DataFrame {
        DataFrame::new(self.table.take_rows(indices))
    }

    pub fn head(&self, n: usize) -> DataFrame {
        let indices: Vec<usize> = (0..self.table.row_count().min(n)).collect();
        self.take_rows(&indices)
    }

    pub fn tail(&self, n: usize) -> DataFrame {
        let rows = self.table.row_count();
        let indices: Vec<usize> = (rows.saturating_sub(n)..rows).collect();
        self.take_rows(&indices)
    }

    pub fn select(&self, names: &[String]) -> Result<DataFrame, TableError> {
        Ok(DataFrame::new(self.table.select(names)?))
    }

    /// Stable sort by one column; missing values sort last either way.
    pub fn sort_by(&self, name: &str, ascending: bool) -> Result<DataFrame, TableError> {
        let column = self
            .table
            .column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        let mut indices: Vec<usize> = (0..self.table.row_count()).collect();
        indices.sort_by(|&a, &b| {
            let (va, vb) = (&column.values[a], &column.values[b]);
            match (va.is_missing(), vb.is_missing()) {
                (false, false) if ascending => va.sort_cmp(vb),
                (false, false) => vb.sort_cmp(va),
                _ => va.sort_cmp(vb),
            }
        });
        Ok(self.take_rows(&indices))
    }

    /// Aggregate `value` per distinct `key`, in first-seen key order. Rows
    /// with a missing key are dropped.
    pub fn group_by(
        &self,
        key: &str,
        value: &str,
        agg: Aggregation,
    ) -> Result<Vec<(String, CellValue)>, TableError> {
        let keys = self.column(key)?;
        let values = self.column(value)?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<CellValue>> = HashMap::new();
        for (k, v) in keys.values.iter().zip(values.values) {
            if k.is_missing() {
                continue;
            }
            let group = k.group_key();
            groups
                .entry(group.clone())
                .or_insert_with(|| {
                    order.push(group);
                    Vec::new()
                })
                .push(v);
        }

        order
            .into_iter()
            .map(|group| {
                let members = groups.remove(&group).unwrap_or_default();
                let result = agg.apply(&Series::new(value, members))?;
                Ok((group, result))
            })
            .collect()
    }
}

/// Right-hand side of a column assignment.
#[derive(Clone, Debug)]
pub enum ColumnSource {
    Values(Vec<CellValue>),
    Scalar(CellValue),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(Table::from_rows(
            vec!["region".into(), "revenue".into()],
            vec![
                vec![CellValue::Text("North".into()), CellValue::Number(100.0)],
                vec![CellValue::Text("South".into()), CellValue::Number(250.0)],
                vec![CellValue::Text("North".into()), CellValue::Missing],
                vec![CellValue::Text("East".into()), CellValue::Number(50.0)],
            ],
        ))
    }

    #[test]
    fn test_aggregations_skip_missing() {
        let revenue = frame().column("revenue").unwrap();
        assert_eq!(revenue.sum().unwrap(), 400.0);
        assert_eq!(revenue.count(), 3);
        assert_eq!(revenue.null_count(), 1);
        assert!((revenue.mean().unwrap() - 133.333).abs() < 0.001);
        assert_eq!(revenue.median().unwrap(), 100.0);
        assert_eq!(revenue.min().unwrap(), CellValue::Number(50.0));
        assert_eq!(revenue.max().unwrap(), CellValue::Number(250.0));
    }

    #[test]
    fn test_sum_of_text_is_an_error() {
        let err = frame().column("region").unwrap().sum().unwrap_err();
        assert!(matches!(err, TableError::NotNumeric { .. }));
    }

    #[test]
    fn test_empty_series_statistics() {
        let empty = Series::new("e", vec![]);
        assert_eq!(empty.sum().unwrap(), 0.0);
        assert!(empty.mean().unwrap().is_nan());
        assert_eq!(empty.min().unwrap(), CellValue::Missing);
    }

    #[test]
    fn test_text_min_max() {
        let region = frame().column("region").unwrap();
        assert_eq!(region.min().unwrap(), CellValue::Text("East".into()));
        assert_eq!(region.max().unwrap(), CellValue::Text("South".into()));
    }

    #[test]
    fn test_value_counts_orders_by_frequency() {
        let counts = frame().column("region").unwrap().value_counts();
        assert_eq!(counts[0], ("North".to_string(), 2));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_get_negative_index() {
        let region = frame().column("region").unwrap();
        assert_eq!(region.get(-1).unwrap(), CellValue::Text("East".into()));
        assert!(region.get(4).is_err());
        assert!(region.get(-5).is_err());
    }

    #[test]
    fn test_filter_mask_and_compare() {
        let df = frame();
        let mask = df
            .column("revenue")
            .unwrap()
            .compare(&CellValue::Number(75.0), CmpOp::Gt);
        let filtered = df.filter_mask(&mask).unwrap();
        assert_eq!(filtered.table().row_count(), 2);
    }

    #[test]
    fn test_sort_by_descending_keeps_missing_last() {
        let sorted = frame().sort_by("revenue", false).unwrap();
        let revenue = sorted.column("revenue").unwrap();
        assert_eq!(revenue.get(0).unwrap(), CellValue::Number(250.0));
        assert_eq!(revenue.get(-1).unwrap(), CellValue::Missing);
    }

    #[test]
    fn test_group_by_sum() {
        let groups = frame()
            .group_by("region", "revenue", Aggregation::Sum)
            .unwrap();
        assert_eq!(
            groups,
            vec![
                ("North".to_string(), CellValue::Number(100.0)),
                ("South".to_string(), CellValue::Number(250.0)),
                ("East".to_string(), CellValue::Number(50.0)),
            ]
        );
    }

    #[test]
    fn test_assign_is_copy_on_write() {
        let original = frame();
        let mut copy = original.clone();
        copy.assign("flag", ColumnSource::Scalar(CellValue::Bool(true)))
            .unwrap();
        assert_eq!(copy.table().column_count(), 3);
        assert_eq!(original.table().column_count(), 2);
    }

    #[test]
    fn test_arithmetic_propagates_missing() {
        let revenue = frame().column("revenue").unwrap();
        let doubled = revenue.with_scalar(2.0, ArithOp::Mul, false).unwrap();
        assert_eq!(doubled.get(1).unwrap(), CellValue::Number(500.0));
        assert_eq!(doubled.get(2).unwrap(), CellValue::Missing);
    }
}
