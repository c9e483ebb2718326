//! Storage module - reading spreadsheet files from disk.

pub mod xlsx;

pub use xlsx::{list_sheets, load_table};
