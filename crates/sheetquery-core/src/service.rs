//! Request handling: the four operations over a catalog of workbooks.
//!
//! [`QueryService`] offers typed methods for each operation and a
//! [`QueryService::handle`] entry point that takes a [`Request`] and always
//! produces a [`Response`] with a `message` field.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use sheetquery_engine::engine::{ColumnType, EvalLimits, Table, TransportValue, coerce, evaluate};

use crate::catalog::Catalog;
use crate::error::{QueryError, Result};
use crate::storage;

/// Reply text for a sheets or columns request naming a file that is not there.
pub const FILE_NOT_FOUND_MESSAGE: &str = "Excel file not found.";

/// One of the operations a request can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Operation {
    #[serde(rename = "get_files")]
    ListFiles,
    #[serde(rename = "get_sheet_names")]
    ListSheets,
    #[serde(rename = "get_sheet_metadata")]
    Columns,
    #[serde(rename = "analyse_data")]
    Evaluate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListFiles => "get_files",
            Operation::ListSheets => "get_sheet_names",
            Operation::Columns => "get_sheet_metadata",
            Operation::Evaluate => "analyse_data",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as a transport would deliver it.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Request {
    pub operation: Operation,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl Request {
    pub fn new(operation: Operation) -> Self {
        Request {
            operation,
            file_name: String::new(),
            sheet_name: None,
            query: None,
        }
    }

    pub fn file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn sheet(mut self, sheet_name: Option<String>) -> Self {
        self.sheet_name = sheet_name;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// A column name with its inferred type.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Payload of a [`Response`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Names(Vec<String>),
    Columns(Vec<ColumnInfo>),
    Value(TransportValue),
    Text(String),
}

impl Message {
    /// Plain-text form: one name per line, or the value itself.
    pub fn to_display(&self) -> String {
        match self {
            Message::Names(names) => names.join("\n"),
            Message::Columns(columns) => columns
                .iter()
                .map(|c| format!("{}\t{}", c.name, c.column_type))
                .collect::<Vec<_>>()
                .join("\n"),
            Message::Value(value) => value.to_display(),
            Message::Text(text) => text.clone(),
        }
    }
}

/// `{"message": ...}`, plus `"is_error": true` on failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Response {
    pub message: Message,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Response {
    fn ok(message: Message) -> Self {
        Response {
            message,
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Response {
            message: Message::Text(text.into()),
            is_error: true,
        }
    }
}

/// Runs requests against one catalog. Holds no per-request state.
#[derive(Clone, Debug)]
pub struct QueryService {
    catalog: Catalog,
    limits: EvalLimits,
}

impl QueryService {
    pub fn new(catalog: Catalog, limits: EvalLimits) -> Self {
        QueryService { catalog, limits }
    }

    pub fn list_files(&self) -> Result<Vec<String>> {
        self.catalog.list_files()
    }

    pub fn list_sheets(&self, file_name: &str) -> Result<Vec<String>> {
        let path = self.catalog.resolve(file_name)?;
        storage::list_sheets(&path)
    }

    /// Load a sheet (the first one when `sheet_name` is `None`).
    pub fn load(&self, file_name: &str, sheet_name: Option<&str>) -> Result<Table> {
        let path = self.catalog.resolve(file_name)?;
        storage::load_table(&path, sheet_name)
    }

    pub fn columns(&self, file_name: &str, sheet_name: Option<&str>) -> Result<Vec<String>> {
        Ok(self.load(file_name, sheet_name)?.column_names())
    }

    pub fn schema(
        &self,
        file_name: &str,
        sheet_name: Option<&str>,
    ) -> Result<Vec<(String, ColumnType)>> {
        Ok(self.load(file_name, sheet_name)?.schema())
    }

    /// Load the sheet, run `query` against it, and coerce what it left in `x`.
    pub fn evaluate(
        &self,
        file_name: &str,
        sheet_name: Option<&str>,
        query: &str,
    ) -> Result<TransportValue> {
        let table = self.load(file_name, sheet_name)?;
        let result = evaluate(&table, query, &self.limits)?;
        Ok(coerce(&result))
    }

    /// Column names and types of a sheet, reported the same way as a
    /// columns request.
    pub fn describe_columns(&self, file_name: &str, sheet_name: Option<&str>) -> Response {
        match self.schema(file_name, sheet_name) {
            Ok(schema) => Response::ok(Message::Columns(
                schema
                    .into_iter()
                    .map(|(name, column_type)| ColumnInfo { name, column_type })
                    .collect(),
            )),
            Err(e) => Response::error(metadata_error_message(&e)),
        }
    }

    /// Dispatch a request. Failures are reported in the response, never
    /// returned.
    pub fn handle(&self, request: &Request) -> Response {
        let file = request.file_name.as_str();
        let sheet = request.sheet_name.as_deref();
        info!(operation = %request.operation, file, sheet, "handling request");

        match request.operation {
            Operation::ListFiles => match self.list_files() {
                Ok(names) => Response::ok(Message::Names(names)),
                Err(e) => Response::error(e.to_string()),
            },
            Operation::ListSheets => match self.list_sheets(file) {
                Ok(names) => Response::ok(Message::Names(names)),
                Err(e) => Response::error(metadata_error_message(&e)),
            },
            Operation::Columns => match self.columns(file, sheet) {
                Ok(names) => Response::ok(Message::Names(names)),
                Err(e) => Response::error(metadata_error_message(&e)),
            },
            Operation::Evaluate => {
                let query = request.query.as_deref().unwrap_or_default();
                match self.evaluate(file, sheet, query) {
                    Ok(value) => Response::ok(Message::Value(value)),
                    Err(e) => {
                        warn!(file, sheet, error = %e, "query failed");
                        Response::error(e.to_string())
                    }
                }
            }
        }
    }
}

fn metadata_error_message(err: &QueryError) -> String {
    match err {
        QueryError::NotFound { .. } => FILE_NOT_FOUND_MESSAGE.to_string(),
        other => other.to_string(),
    }
}
