//! Query engine API.
//!
//! This module provides the table model and the scoped query evaluator:
//!
//! - [`CellValue`], [`ColumnType`] - Typed cells and inferred column types
//! - [`Table`], [`Column`] - In-memory tables with unique column names
//! - [`DataFrame`], [`Series`] - The table as seen from inside a query
//! - [`evaluate`] - Run a query against a table in a fresh `df`-only scope
//! - [`coerce`] - Turn a query result into a [`TransportValue`]

mod eval;
mod format;
mod frame;
mod preprocess;
mod table;
mod value;

pub use eval::{
    EvalLimits, RESULT_BINDING, ResultValue, TABLE_BINDING, TIMEOUT_TOKEN, Unbound, create_engine,
    create_scope, evaluate, is_timeout,
};
pub use format::{TransportValue, coerce, coerce_dynamic, format_dynamic, format_number};
pub use frame::{Aggregation, ArithOp, CmpOp, ColumnSource, DataFrame, Series};
pub use preprocess::assigned_names;
pub use table::{Column, Table, TableError, dedupe_column_names};
pub use value::{CellValue, ColumnType, format_datetime};

pub use rhai::{Dynamic, EvalAltResult, Position};
