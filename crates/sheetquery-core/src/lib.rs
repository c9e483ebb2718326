//! sheetquery-core - workbook loading, file catalog and request handling.

pub mod catalog;
pub mod error;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod fixtures;

pub use catalog::Catalog;
pub use error::{QueryError, Result};
pub use service::{ColumnInfo, Message, Operation, QueryService, Request, Response};

pub use sheetquery_engine::engine::{ColumnType, EvalLimits, Table, TransportValue};
