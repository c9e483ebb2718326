//! Table API exposed to queries.
//!
//! Conventions:
//! - `DataFrame` and `Series` methods use lower-case pandas-style names
//!   (`sum`, `mean`, `head`, `value_counts`).
//! - Missing cells surface as `()` inside scripts.
//! - Failures raise runtime errors with the table error text, which reaches
//!   the caller verbatim.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, Map, NativeCallContext,
    Position,
};

use crate::engine::{
    Aggregation, ArithOp, CellValue, CmpOp, ColumnSource, DataFrame, Series, Table, TableError,
    format_datetime,
};

/// Rows shown by `head()` / `tail()` without an argument.
const DEFAULT_PREVIEW_ROWS: usize = 5;

fn invalid_arg(message: &str) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(message.into(), Position::NONE).into()
}

fn table_err(err: TableError) -> Box<EvalAltResult> {
    invalid_arg(&err.to_string())
}

fn to_usize(value: i64, label: &str) -> Result<usize, Box<EvalAltResult>> {
    usize::try_from(value).map_err(|_| invalid_arg(&format!("{} must be >= 0", label)))
}

fn to_array(values: &[CellValue]) -> Array {
    values.iter().map(CellValue::to_dynamic).collect()
}

fn row_map(table: &Table, index: usize) -> Map {
    let mut map = Map::new();
    if let Some(row) = table.row(index) {
        for (name, value) in row {
            map.insert(name.into(), value.to_dynamic());
        }
    }
    map
}

/// `[key, value]`, the element type of the ordered results.
fn pair(key: String, value: Dynamic) -> Dynamic {
    Dynamic::from_array(vec![Dynamic::from(key), value])
}

fn to_cell(value: &Dynamic) -> Result<CellValue, Box<EvalAltResult>> {
    CellValue::from_dynamic(value).ok_or_else(|| {
        invalid_arg(&format!(
            "cannot store a value of type {} in a column",
            value.type_name()
        ))
    })
}

fn to_names(names: Array) -> Result<Vec<String>, Box<EvalAltResult>> {
    names
        .into_iter()
        .map(|name| {
            name.into_string()
                .map_err(|t| invalid_arg(&format!("column names must be strings, got {}", t)))
        })
        .collect()
}

fn column_source(value: Dynamic) -> Result<ColumnSource, Box<EvalAltResult>> {
    if value.is::<Series>() {
        let series = value.cast::<Series>();
        return Ok(ColumnSource::Values(series.into_values()));
    }
    if value.is_array() {
        let items = value.into_array().map_err(|t| invalid_arg(t))?;
        let cells = items.iter().map(to_cell).collect::<Result<Vec<_>, _>>()?;
        return Ok(ColumnSource::Values(cells));
    }
    Ok(ColumnSource::Scalar(to_cell(&value)?))
}

fn predicate(
    ctx: &NativeCallContext,
    pred: &FnPtr,
    arg: Dynamic,
) -> Result<bool, Box<EvalAltResult>> {
    let result: Dynamic = pred.call_within_context(ctx, (arg,))?;
    result
        .as_bool()
        .map_err(|t| invalid_arg(&format!("filter predicate must return a bool, got {}", t)))
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime, Box<EvalAltResult>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| invalid_arg(&format!("invalid datetime '{}'", text)))
}

/// Register the table API into the Rhai engine.
pub fn register_builtins(engine: &mut Engine) {
    register_frame(engine);
    register_series(engine);
    register_series_operators(engine);
    register_datetime(engine);
}

fn register_frame(engine: &mut Engine) {
    engine.register_type_with_name::<DataFrame>("DataFrame");

    // df.columns / df.shape / df.empty
    engine.register_get("columns", |df: &mut DataFrame| -> Array {
        df.table()
            .column_names()
            .into_iter()
            .map(Dynamic::from)
            .collect()
    });
    engine.register_get("shape", |df: &mut DataFrame| -> Array {
        vec![
            Dynamic::from_int(df.table().row_count() as i64),
            Dynamic::from_int(df.table().column_count() as i64),
        ]
    });
    engine.register_get("empty", |df: &mut DataFrame| -> bool {
        df.table().row_count() == 0
    });
    engine.register_fn("len", |df: &mut DataFrame| -> i64 {
        df.table().row_count() as i64
    });

    // df["col"] -> Series, df[mask] -> DataFrame
    engine.register_indexer_get(
        |df: &mut DataFrame, name: &str| -> Result<Series, Box<EvalAltResult>> {
            df.column(name).map_err(table_err)
        },
    );
    engine.register_indexer_get(
        |df: &mut DataFrame, mask: Series| -> Result<DataFrame, Box<EvalAltResult>> {
            df.filter_mask(&mask).map_err(table_err)
        },
    );

    // df["col"] = series | array | scalar (changes this query's copy only)
    engine.register_indexer_set(
        |df: &mut DataFrame, name: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let source = column_source(value)?;
            df.assign(name, source).map_err(table_err)
        },
    );

    engine.register_fn("head", |df: &mut DataFrame| -> DataFrame {
        df.head(DEFAULT_PREVIEW_ROWS)
    });
    engine.register_fn(
        "head",
        |df: &mut DataFrame, n: i64| -> Result<DataFrame, Box<EvalAltResult>> {
            Ok(df.head(to_usize(n, "n")?))
        },
    );
    engine.register_fn("tail", |df: &mut DataFrame| -> DataFrame {
        df.tail(DEFAULT_PREVIEW_ROWS)
    });
    engine.register_fn(
        "tail",
        |df: &mut DataFrame, n: i64| -> Result<DataFrame, Box<EvalAltResult>> {
            Ok(df.tail(to_usize(n, "n")?))
        },
    );

    // row(i) -> #{ column: value, ... }
    engine.register_fn(
        "row",
        |df: &mut DataFrame, index: i64| -> Result<Map, Box<EvalAltResult>> {
            let len = df.table().row_count();
            match usize::try_from(index) {
                Ok(i) if i < len => Ok(row_map(df.table(), i)),
                _ => Err(table_err(TableError::IndexOutOfRange { index, len })),
            }
        },
    );
    engine.register_fn("rows", |df: &mut DataFrame| -> Array {
        (0..df.table().row_count())
            .map(|i| Dynamic::from_map(row_map(df.table(), i)))
            .collect()
    });

    engine.register_fn(
        "select",
        |df: &mut DataFrame, names: Array| -> Result<DataFrame, Box<EvalAltResult>> {
            df.select(&to_names(names)?).map_err(table_err)
        },
    );

    // filter(|row| ...): keep rows whose predicate returns true
    engine.register_fn(
        "filter",
        |ctx: NativeCallContext,
         df: &mut DataFrame,
         pred: FnPtr|
         -> Result<DataFrame, Box<EvalAltResult>> {
            let mut keep = Vec::new();
            for i in 0..df.table().row_count() {
                let row = Dynamic::from_map(row_map(df.table(), i));
                if predicate(&ctx, &pred, row)? {
                    keep.push(i);
                }
            }
            Ok(df.take_rows(&keep))
        },
    );

    engine.register_fn(
        "sort_by",
        |df: &mut DataFrame, name: &str| -> Result<DataFrame, Box<EvalAltResult>> {
            df.sort_by(name, true).map_err(table_err)
        },
    );
    engine.register_fn(
        "sort_by",
        |df: &mut DataFrame, name: &str, ascending: bool| -> Result<DataFrame, Box<EvalAltResult>> {
            df.sort_by(name, ascending).map_err(table_err)
        },
    );

    // group_by(key, value, "sum"|"mean"|"min"|"max"|"count") -> [[key, result], ...]
    // in first-seen key order
    engine.register_fn(
        "group_by",
        |df: &mut DataFrame, key: &str, value: &str, agg: &str| -> Result<Array, Box<EvalAltResult>> {
            let agg = Aggregation::parse(agg).map_err(table_err)?;
            let groups = df.group_by(key, value, agg).map_err(table_err)?;
            Ok(groups
                .into_iter()
                .map(|(group, result)| pair(group, result.to_dynamic()))
                .collect())
        },
    );

    engine.register_fn("to_string", |df: &mut DataFrame| -> String {
        df.table().render()
    });
    engine.register_fn("to_debug", |df: &mut DataFrame| -> String {
        df.table().render()
    });
}

fn register_series(engine: &mut Engine) {
    engine.register_type_with_name::<Series>("Series");

    engine.register_get("name", |s: &mut Series| -> String { s.name().to_string() });
    engine.register_fn("len", |s: &mut Series| -> i64 { s.len() as i64 });
    engine.register_fn("count", |s: &mut Series| -> i64 { s.count() as i64 });
    engine.register_fn("null_count", |s: &mut Series| -> i64 { s.null_count() as i64 });

    // Numeric aggregations skip missing values; text is an error.
    engine.register_fn("sum", |s: &mut Series| -> Result<f64, Box<EvalAltResult>> {
        s.sum().map_err(table_err)
    });
    engine.register_fn("mean", |s: &mut Series| -> Result<f64, Box<EvalAltResult>> {
        s.mean().map_err(table_err)
    });
    engine.register_fn("median", |s: &mut Series| -> Result<f64, Box<EvalAltResult>> {
        s.median().map_err(table_err)
    });
    engine.register_fn("std", |s: &mut Series| -> Result<f64, Box<EvalAltResult>> {
        s.std().map_err(table_err)
    });
    engine.register_fn("var", |s: &mut Series| -> Result<f64, Box<EvalAltResult>> {
        s.var().map_err(table_err)
    });
    engine.register_fn("min", |s: &mut Series| -> Result<Dynamic, Box<EvalAltResult>> {
        s.min().map(|v| v.to_dynamic()).map_err(table_err)
    });
    engine.register_fn("max", |s: &mut Series| -> Result<Dynamic, Box<EvalAltResult>> {
        s.max().map(|v| v.to_dynamic()).map_err(table_err)
    });

    engine.register_fn("unique", |s: &mut Series| -> Array { to_array(&s.unique()) });
    engine.register_fn("nunique", |s: &mut Series| -> i64 { s.nunique() as i64 });
    // [[value, count], ...], most frequent first
    engine.register_fn("value_counts", |s: &mut Series| -> Array {
        s.value_counts()
            .into_iter()
            .map(|(key, count)| pair(key, Dynamic::from_int(count as i64)))
            .collect()
    });
    engine.register_fn("to_array", |s: &mut Series| -> Array { to_array(s.values()) });

    // s[i], negative counts from the end
    engine.register_indexer_get(
        |s: &mut Series, index: i64| -> Result<Dynamic, Box<EvalAltResult>> {
            s.get(index).map(|v| v.to_dynamic()).map_err(table_err)
        },
    );
    engine.register_fn("first", |s: &mut Series| -> Result<Dynamic, Box<EvalAltResult>> {
        s.get(0).map(|v| v.to_dynamic()).map_err(table_err)
    });
    engine.register_fn("last", |s: &mut Series| -> Result<Dynamic, Box<EvalAltResult>> {
        s.get(-1).map(|v| v.to_dynamic()).map_err(table_err)
    });

    engine.register_fn("head", |s: &mut Series| -> Series { s.head(DEFAULT_PREVIEW_ROWS) });
    engine.register_fn(
        "head",
        |s: &mut Series, n: i64| -> Result<Series, Box<EvalAltResult>> {
            Ok(s.head(to_usize(n, "n")?))
        },
    );
    engine.register_fn("tail", |s: &mut Series| -> Series { s.tail(DEFAULT_PREVIEW_ROWS) });
    engine.register_fn(
        "tail",
        |s: &mut Series, n: i64| -> Result<Series, Box<EvalAltResult>> {
            Ok(s.tail(to_usize(n, "n")?))
        },
    );

    // filter(|v| ...) / map(|v| ...)
    engine.register_fn(
        "filter",
        |ctx: NativeCallContext, s: &mut Series, pred: FnPtr| -> Result<Series, Box<EvalAltResult>> {
            let mut kept = Vec::new();
            for value in s.values() {
                if predicate(&ctx, &pred, value.to_dynamic())? {
                    kept.push(value.clone());
                }
            }
            Ok(Series::new(s.name(), kept))
        },
    );
    engine.register_fn(
        "map",
        |ctx: NativeCallContext, s: &mut Series, func: FnPtr| -> Result<Series, Box<EvalAltResult>> {
            let mut mapped = Vec::with_capacity(s.len());
            for value in s.values() {
                let result: Dynamic = func.call_within_context(&ctx, (value.to_dynamic(),))?;
                mapped.push(to_cell(&result)?);
            }
            Ok(Series::new(s.name(), mapped))
        },
    );

    engine.register_fn("to_string", |s: &mut Series| -> String { s.render() });
    engine.register_fn("to_debug", |s: &mut Series| -> String { s.render() });
}

fn register_series_operators(engine: &mut Engine) {
    // Element-wise arithmetic: Series (+-*/) Series | number, number (+-*/) Series
    for (symbol, op) in [
        ("+", ArithOp::Add),
        ("-", ArithOp::Sub),
        ("*", ArithOp::Mul),
        ("/", ArithOp::Div),
    ] {
        engine.register_fn(
            symbol,
            move |a: Series, b: Series| -> Result<Series, Box<EvalAltResult>> {
                a.zip_with(&b, op).map_err(table_err)
            },
        );
        engine.register_fn(
            symbol,
            move |a: Series, b: f64| -> Result<Series, Box<EvalAltResult>> {
                a.with_scalar(b, op, false).map_err(table_err)
            },
        );
        engine.register_fn(
            symbol,
            move |a: Series, b: i64| -> Result<Series, Box<EvalAltResult>> {
                a.with_scalar(b as f64, op, false).map_err(table_err)
            },
        );
        engine.register_fn(
            symbol,
            move |a: f64, b: Series| -> Result<Series, Box<EvalAltResult>> {
                b.with_scalar(a, op, true).map_err(table_err)
            },
        );
        engine.register_fn(
            symbol,
            move |a: i64, b: Series| -> Result<Series, Box<EvalAltResult>> {
                b.with_scalar(a as f64, op, true).map_err(table_err)
            },
        );
    }

    // Element-wise comparison against a scalar -> boolean Series
    for (symbol, op) in [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<", CmpOp::Lt),
        ("<=", CmpOp::Le),
        (">", CmpOp::Gt),
        (">=", CmpOp::Ge),
    ] {
        engine.register_fn(symbol, move |a: Series, b: f64| -> Series {
            a.compare(&CellValue::Number(b), op)
        });
        engine.register_fn(symbol, move |a: Series, b: i64| -> Series {
            a.compare(&CellValue::Number(b as f64), op)
        });
        engine.register_fn(symbol, move |a: Series, b: ImmutableString| -> Series {
            a.compare(&CellValue::Text(b.to_string()), op)
        });
        engine.register_fn(symbol, move |a: Series, b: bool| -> Series {
            a.compare(&CellValue::Bool(b), op)
        });
        engine.register_fn(symbol, move |a: Series, b: NaiveDateTime| -> Series {
            a.compare(&CellValue::DateTime(b), op)
        });
    }

    // Mask combinators
    engine.register_fn(
        "&",
        |a: Series, b: Series| -> Result<Series, Box<EvalAltResult>> {
            a.combine_mask(&b, true).map_err(table_err)
        },
    );
    engine.register_fn(
        "|",
        |a: Series, b: Series| -> Result<Series, Box<EvalAltResult>> {
            a.combine_mask(&b, false).map_err(table_err)
        },
    );
}

fn register_datetime(engine: &mut Engine) {
    engine.register_type_with_name::<NaiveDateTime>("DateTime");

    // datetime("2024-01-31") / datetime("2024-01-31 08:00:00")
    engine.register_fn("datetime", |text: &str| -> Result<NaiveDateTime, Box<EvalAltResult>> {
        parse_datetime(text)
    });

    engine.register_get("year", |dt: &mut NaiveDateTime| -> i64 { dt.year() as i64 });
    engine.register_get("month", |dt: &mut NaiveDateTime| -> i64 { dt.month() as i64 });
    engine.register_get("day", |dt: &mut NaiveDateTime| -> i64 { dt.day() as i64 });
    engine.register_get("hour", |dt: &mut NaiveDateTime| -> i64 { dt.hour() as i64 });
    engine.register_get("minute", |dt: &mut NaiveDateTime| -> i64 { dt.minute() as i64 });
    engine.register_get("second", |dt: &mut NaiveDateTime| -> i64 { dt.second() as i64 });

    engine.register_fn("==", |a: NaiveDateTime, b: NaiveDateTime| -> bool { a == b });
    engine.register_fn("!=", |a: NaiveDateTime, b: NaiveDateTime| -> bool { a != b });
    engine.register_fn("<", |a: NaiveDateTime, b: NaiveDateTime| -> bool { a < b });
    engine.register_fn("<=", |a: NaiveDateTime, b: NaiveDateTime| -> bool { a <= b });
    engine.register_fn(">", |a: NaiveDateTime, b: NaiveDateTime| -> bool { a > b });
    engine.register_fn(">=", |a: NaiveDateTime, b: NaiveDateTime| -> bool { a >= b });

    engine.register_fn("to_string", |dt: &mut NaiveDateTime| -> String { format_datetime(dt) });
    engine.register_fn("to_debug", |dt: &mut NaiveDateTime| -> String { format_datetime(dt) });
}
