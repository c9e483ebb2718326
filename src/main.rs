//! Sheetquery - query spreadsheet files with Rhai scripts

mod config;
mod logging;

use anyhow::Result;
use sheetquery_core::{Catalog, EvalLimits, Operation, QueryService, Request, Response};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

fn print_usage() {
    eprintln!("Usage: sheetquery [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  files                          List spreadsheet files in the data directory");
    eprintln!("  sheets <FILE>                  List the sheets of a file");
    eprintln!("  columns <FILE> [-s SHEET]      List the column names of a sheet");
    eprintln!("          [--types]              Also print each column's inferred type");
    eprintln!("  query <FILE> [-s SHEET] <QUERY>");
    eprintln!("                                 Run a Rhai query; prints the value left in `x`");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --data-dir <DIR>           Directory holding the spreadsheet files (default ./data)");
    eprintln!("  -c, --config <FILE>            Load settings from this TOML file");
    eprintln!("  -s, --sheet <SHEET>            Sheet to read (default: the first sheet)");
    eprintln!("  --json                         Print the reply as JSON");
    eprintln!("  --timeout-ms <MS>              Wall-clock limit per query (0 disables)");
    eprintln!("  --max-operations <N>           Operation budget per query (0 disables)");
    eprintln!("  --log-level <LEVEL>            Log filter, e.g. info or sheetquery_core=debug");
    eprintln!("  -h, --help                     Print help");
}

#[derive(Debug, PartialEq)]
enum Command {
    Files,
    Sheets { file: String },
    Columns { file: String, types: bool },
    Query { file: String, query: String },
}

#[derive(Debug, Default, PartialEq)]
struct Cli {
    command: Option<Command>,
    sheet: Option<String>,
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
    timeout_ms: Option<u64>,
    max_operations: Option<u64>,
    log_level: Option<String>,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut cli = Cli::default();
    let mut positional: Vec<String> = Vec::new();
    let mut types = false;

    fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
        *i += 1;
        args.get(*i)
            .map(String::as_str)
            .ok_or_else(|| format!("{} requires a value", flag))
    }

    fn number(raw: &str, flag: &str) -> Result<u64, String> {
        raw.parse()
            .map_err(|_| format!("{} expects a non-negative integer, got '{}'", flag, raw))
    }

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => cli.help = true,
            "-d" | "--data-dir" => {
                cli.data_dir = Some(PathBuf::from(value(args, &mut i, "--data-dir")?));
            }
            "-c" | "--config" => {
                cli.config = Some(PathBuf::from(value(args, &mut i, "--config")?));
            }
            "-s" | "--sheet" => cli.sheet = Some(value(args, &mut i, "--sheet")?.to_string()),
            "--json" => cli.json = true,
            "--types" => types = true,
            "--timeout-ms" => {
                cli.timeout_ms = Some(number(value(args, &mut i, "--timeout-ms")?, "--timeout-ms")?);
            }
            "--max-operations" => {
                cli.max_operations = Some(number(
                    value(args, &mut i, "--max-operations")?,
                    "--max-operations",
                )?);
            }
            "--log-level" => {
                cli.log_level = Some(value(args, &mut i, "--log-level")?.to_string());
            }
            "--" => {
                positional.extend(args[i + 1..].iter().cloned());
                break;
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    if cli.help {
        return Ok(cli);
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or("Missing command")?;
    let mut file = |what: &str| {
        positional
            .next()
            .ok_or_else(|| format!("{} requires a file name", what))
    };
    let command = match name.as_str() {
        "files" => Command::Files,
        "sheets" => Command::Sheets {
            file: file("sheets")?,
        },
        "columns" => Command::Columns {
            file: file("columns")?,
            types,
        },
        "query" => {
            let file = file("query")?;
            let query = positional.next().ok_or("query requires a query string")?;
            Command::Query { file, query }
        }
        other => return Err(format!("Unknown command: {}", other)),
    };
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }
    if types && !matches!(command, Command::Columns { .. }) {
        return Err("--types only applies to columns".to_string());
    }
    cli.command = Some(command);
    Ok(cli)
}

fn limits_for(cli: &Cli, config: &Config) -> EvalLimits {
    let mut limits = config.limits.clone();
    if let Some(ms) = cli.timeout_ms {
        limits.timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }
    if let Some(n) = cli.max_operations {
        limits.max_operations = n;
    }
    limits
}

fn print_response(response: &Response, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(response)?);
    } else if response.is_error {
        eprintln!("Error: {}", response.message.to_display());
    } else {
        println!("{}", response.message.to_display());
    }
    Ok(())
}

/// Run the parsed command. Returns whether it succeeded.
fn run(cli: Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init_logging(cli.log_level.as_deref(), config.log_level.as_deref())?;

    let limits = limits_for(&cli, &config);
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir.clone());
    debug!(data_dir = %data_dir.display(), ?limits, "configured");
    let service = QueryService::new(Catalog::new(data_dir), limits);

    let sheet = cli.sheet.clone();
    let request = match cli.command {
        None => return Ok(false),
        Some(Command::Files) => Request::new(Operation::ListFiles),
        Some(Command::Sheets { file }) => Request::new(Operation::ListSheets).file(file),
        Some(Command::Columns { file, types: true }) => {
            let response = service.describe_columns(&file, sheet.as_deref());
            print_response(&response, cli.json)?;
            return Ok(!response.is_error);
        }
        Some(Command::Columns { file, types: false }) => {
            Request::new(Operation::Columns).file(file).sheet(sheet)
        }
        Some(Command::Query { file, query }) => Request::new(Operation::Evaluate)
            .file(file)
            .sheet(sheet)
            .query(query),
    };

    let response = service.handle(&request);
    print_response(&response, cli.json)?;
    Ok(!response.is_error)
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let cli = match parse_args(&args) {
        Ok(cli) if cli.help => {
            print_usage();
            return;
        }
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("sheetquery")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_query_with_options_anywhere() {
        let cli = parse_args(&args(&[
            "--json",
            "query",
            "sales.xlsx",
            "-s",
            "Q1",
            "x = 1",
            "--timeout-ms",
            "250",
        ]))
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.sheet.as_deref(), Some("Q1"));
        assert_eq!(cli.timeout_ms, Some(250));
        assert_eq!(
            cli.command,
            Some(Command::Query {
                file: "sales.xlsx".into(),
                query: "x = 1".into()
            })
        );
    }

    #[test]
    fn test_parse_columns_types() {
        let cli = parse_args(&args(&["columns", "a.xlsx", "--types"])).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Columns {
                file: "a.xlsx".into(),
                types: true
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["sheets"])).is_err());
        assert!(parse_args(&args(&["query", "a.xlsx"])).is_err());
        assert!(parse_args(&args(&["files", "extra"])).is_err());
        assert!(parse_args(&args(&["files", "--bogus"])).is_err());
        assert!(parse_args(&args(&["files", "--timeout-ms", "soon"])).is_err());
        assert!(parse_args(&args(&["files", "--types"])).is_err());
    }

    #[test]
    fn test_double_dash_allows_leading_minus_query() {
        let cli = parse_args(&args(&["query", "a.xlsx", "--", "-1"])).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Query {
                file: "a.xlsx".into(),
                query: "-1".into()
            })
        );
    }

    #[test]
    fn test_cli_limits_override_config() {
        let cli = Cli {
            timeout_ms: Some(0),
            max_operations: Some(42),
            ..Cli::default()
        };
        let limits = limits_for(&cli, &Config::default());
        assert_eq!(limits.timeout, None);
        assert_eq!(limits.max_operations, 42);
    }
}
