//! Integration tests for the sheetquery binary

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn write_sales(dir: &Path) {
    let mut book = umya_spreadsheet::new_file();
    {
        let q1 = book.get_sheet_by_name_mut("Sheet1").expect("default sheet");
        q1.set_name("Q1");
        for (col, header) in ["region", "revenue", "units"].iter().enumerate() {
            q1.get_cell_mut((col as u32 + 1, 1)).set_value(*header);
        }
        let rows = [("North", 100.0, 10.0), ("South", 250.5, 5.0), ("West", 400.0, 12.0)];
        for (idx, (region, revenue, units)) in rows.iter().enumerate() {
            let row = idx as u32 + 2;
            q1.get_cell_mut((1, row)).set_value(*region);
            q1.get_cell_mut((2, row)).set_value_number(*revenue);
            q1.get_cell_mut((3, row)).set_value_number(*units);
        }
    }
    let _ = book.new_sheet("Q2");
    umya_spreadsheet::writer::xlsx::write(&book, dir.join("sales.xlsx"))
        .expect("write sales workbook");
}

/// A data dir with `sales.xlsx` and an empty config file, so runs do not
/// depend on the user's own config.
fn setup() -> TempDir {
    let tmp = tempfile::tempdir().expect("temp dir");
    let data = tmp.path().join("data");
    std::fs::create_dir(&data).unwrap();
    write_sales(&data);
    std::fs::write(tmp.path().join("config.toml"), "").unwrap();
    tmp
}

fn run_command(tmp: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_sheetquery"))
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(tmp.path().join("config.toml"))
        .arg("--data-dir")
        .arg(tmp.path().join("data"))
        .args(args)
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

#[test]
fn test_files() {
    let tmp = setup();
    let (stdout, _, code) = run_command(&tmp, &["files"]);
    assert_eq!(stdout.trim(), "sales.xlsx");
    assert_eq!(code, 0);
}

#[test]
fn test_sheets() {
    let tmp = setup();
    let (stdout, _, code) = run_command(&tmp, &["sheets", "sales.xlsx"]);
    assert_eq!(stdout.trim(), "Q1\nQ2");
    assert_eq!(code, 0);
}

#[test]
fn test_columns() {
    let tmp = setup();
    let (stdout, _, code) = run_command(&tmp, &["columns", "sales.xlsx"]);
    assert_eq!(stdout.trim(), "region\nrevenue\nunits");
    assert_eq!(code, 0);
}

#[test]
fn test_columns_with_types() {
    let tmp = setup();
    let (stdout, _, code) = run_command(&tmp, &["columns", "sales.xlsx", "-s", "Q1", "--types"]);
    assert_eq!(stdout.trim(), "region\ttext\nrevenue\tnumber\nunits\tnumber");
    assert_eq!(code, 0);
}

#[test]
fn test_query_sum() {
    let tmp = setup();
    let (stdout, _, code) = run_command(
        &tmp,
        &["query", "sales.xlsx", "-s", "Q1", r#"x = df["revenue"].sum()"#],
    );
    assert_eq!(stdout.trim(), "750.5");
    assert_eq!(code, 0);
}

#[test]
fn test_query_json() {
    let tmp = setup();
    let (stdout, _, code) = run_command(
        &tmp,
        &["--json", "query", "sales.xlsx", r#"x = df[df["units"] > 6]["region"].count()"#],
    );
    assert_eq!(stdout.trim(), r#"{"message":2.0}"#);
    assert_eq!(code, 0);
}

#[test]
fn test_query_without_x_prints_empty() {
    let tmp = setup();
    let (stdout, _, code) = run_command(&tmp, &["query", "sales.xlsx", "y = 5"]);
    assert_eq!(stdout.trim(), "");
    assert_eq!(code, 0);
}

#[test]
fn test_query_error_exit_code() {
    let tmp = setup();
    let (_, stderr, code) = run_command(&tmp, &["query", "sales.xlsx", r#"x = df["profit"].sum()"#]);
    assert!(stderr.contains("profit"));
    assert_eq!(code, 1);
}

#[test]
fn test_missing_file_message() {
    let tmp = setup();
    let (_, stderr, code) = run_command(&tmp, &["sheets", "missing.xlsx"]);
    assert!(stderr.contains("Excel file not found."));
    assert_eq!(code, 1);
}

#[test]
fn test_columns_with_types_missing_file() {
    let tmp = setup();
    let (_, stderr, code) = run_command(&tmp, &["columns", "missing.xlsx", "--types"]);
    assert!(stderr.contains("Error: Excel file not found."));
    assert_eq!(code, 1);

    let (stdout, _, code) = run_command(&tmp, &["--json", "columns", "missing.xlsx", "--types"]);
    assert_eq!(stdout.trim(), r#"{"message":"Excel file not found.","is_error":true}"#);
    assert_eq!(code, 1);
}

#[test]
fn test_columns_with_types_json() {
    let tmp = setup();
    let (stdout, _, code) = run_command(&tmp, &["--json", "columns", "sales.xlsx", "--types"]);
    assert_eq!(
        stdout.trim(),
        r#"{"message":[{"name":"region","type":"text"},{"name":"revenue","type":"number"},{"name":"units","type":"number"}]}"#
    );
    assert_eq!(code, 0);
}

#[test]
fn test_bogus_sheet() {
    let tmp = setup();
    let (_, stderr, code) = run_command(&tmp, &["query", "sales.xlsx", "-s", "Bogus", "x = 1"]);
    assert!(stderr.contains("Bogus"));
    assert_eq!(code, 1);
}

#[test]
fn test_infinite_loop_is_stopped() {
    let tmp = setup();
    let (_, _, code) = run_command(
        &tmp,
        &["query", "sales.xlsx", "--max-operations", "10000", "loop { }"],
    );
    assert_eq!(code, 1);
}

#[test]
fn test_usage_error_exit_code() {
    let tmp = setup();
    let (_, stderr, code) = run_command(&tmp, &["frobnicate"]);
    assert!(stderr.contains("Unknown command"));
    assert_eq!(code, 2);
}
