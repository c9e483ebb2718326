//! In-memory tables.
//!
//! A [`Table`] is an ordered list of uniquely named [`Column`]s that all have
//! the same number of rows. Tables are plain owned data: they are built once
//! by a loader and then only read, or copied before being changed.

use thiserror::Error;

use super::value::{CellValue, ColumnType};

/// Maximum number of rows included when rendering a table as text.
const MAX_RENDER_ROWS: usize = 60;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{name}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{name}' holds {found} values, expected numbers")]
    NotNumeric { name: String, found: &'static str },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("mask '{0}' must hold only booleans")]
    NotBoolean(String),

    #[error("{0}")]
    Unsupported(String),
}

/// A named column of cell values.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Column {
        Column {
            name: name.into(),
            values,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::infer(&self.values)
    }
}

/// A rectangular table of named, typed columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking that names are unique and row counts agree.
    pub fn new(columns: Vec<Column>) -> Result<Table, TableError> {
        let expected = columns.first().map(|c| c.values.len()).unwrap_or(0);
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            if column.values.len() != expected {
                return Err(TableError::RowCountMismatch {
                    name: column.name.clone(),
                    expected,
                    actual: column.values.len(),
                });
            }
        }
        Ok(Table { columns })
    }

    /// Build a table from a header and row-major data. Short rows are padded
    /// with missing cells and long rows are truncated to the header width.
    /// Header names are made unique with [`dedupe_column_names`].
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Table {
        let names = dedupe_column_names(header);
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(CellValue::Missing));
            }
        }

        Table { columns }
    }

    /// Column names in left-to-right order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column names paired with their inferred types.
    pub fn schema(&self) -> Vec<(String, ColumnType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.column_type()))
            .collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cells of one row as (column name, value) pairs.
    pub fn row(&self, index: usize) -> Option<Vec<(&str, &CellValue)>> {
        if index >= self.row_count() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), &c.values[index]))
                .collect(),
        )
    }

    /// New table holding the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    indices.iter().map(|&i| c.values[i].clone()).collect(),
                )
            })
            .collect();
        Table { columns }
    }

    /// New table with only the named columns, in the requested order.
    pub fn select(&self, names: &[String]) -> Result<Table, TableError> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| TableError::ColumnNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Table::new(columns)
    }

    /// Replace a column's values, or append a new column.
    pub fn set_column(&mut self, name: &str, values: Vec<CellValue>) -> Result<(), TableError> {
        if !self.columns.is_empty() && values.len() != self.row_count() {
            return Err(TableError::RowCountMismatch {
                name: name.to_string(),
                expected: self.row_count(),
                actual: values.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
        Ok(())
    }

    /// Render as an aligned text grid with a leading row index.
    pub fn render(&self) -> String {
        let shown = self.row_count().min(MAX_RENDER_ROWS);
        let index_width = shown.saturating_sub(1).to_string().len();

        let mut cells: Vec<Vec<String>> = Vec::with_capacity(self.columns.len());
        let mut widths: Vec<usize> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let rendered: Vec<String> = column.values[..shown]
                .iter()
                .map(|v| v.to_string())
                .collect();
            let width = rendered
                .iter()
                .map(|s| s.chars().count())
                .chain(std::iter::once(column.name.chars().count()))
                .max()
                .unwrap_or(0);
            widths.push(width);
            cells.push(rendered);
        }

        let mut out = String::new();
        out.push_str(&" ".repeat(index_width));
        for (column, width) in self.columns.iter().zip(&widths) {
            out.push_str(&format!("  {:>width$}", column.name, width = width));
        }
        for row in 0..shown {
            out.push('\n');
            out.push_str(&format!("{:<width$}", row, width = index_width));
            for (col_cells, width) in cells.iter().zip(&widths) {
                out.push_str(&format!("  {:>width$}", col_cells[row], width = width));
            }
        }
        if self.row_count() > shown {
            out.push_str(&format!("\n... ({} more rows)", self.row_count() - shown));
        }
        out.push_str(&format!(
            "\n\n[{} rows x {} columns]",
            self.row_count(),
            self.column_count()
        ));
        out
    }
}

/// Make header names unique. Blank names become `Unnamed: <index>`, and a
/// repeated name `a` becomes `a.1`, `a.2`, ...
pub fn dedupe_column_names(raw: Vec<String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while names.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}
