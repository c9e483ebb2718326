//! sheetquery_engine - Table model + scoped Rhai query evaluation.

pub(crate) mod builtins;
pub mod engine;

#[cfg(test)]
mod tests {
    use crate::engine::*;
    use std::time::Duration;

    fn sales() -> Table {
        Table::from_rows(
            vec!["region".into(), "revenue".into()],
            vec![
                vec![CellValue::Text("North".into()), CellValue::Number(100.0)],
                vec![CellValue::Text("South".into()), CellValue::Number(250.5)],
                vec![CellValue::Text("East".into()), CellValue::Missing],
                vec![CellValue::Text("West".into()), CellValue::Number(400.0)],
            ],
        )
    }

    fn run(expression: &str) -> TransportValue {
        let result = evaluate(&sales(), expression, &EvalLimits::default()).unwrap();
        coerce(&result)
    }

    #[test]
    fn test_evaluate_sum_assigned_to_x() {
        assert_eq!(run(r#"x = df["revenue"].sum()"#), TransportValue::Number(750.5));
    }

    #[test]
    fn test_evaluate_with_let() {
        assert_eq!(run(r#"let x = df.len()"#), TransportValue::Number(4.0));
    }

    #[test]
    fn test_evaluate_without_x_is_empty_marker() {
        let result = evaluate(&sales(), "y = 5", &EvalLimits::default()).unwrap();
        assert!(!result.is_bound());
        assert_eq!(coerce(&result), TransportValue::Text(String::new()));
    }

    #[test]
    fn test_only_x_is_returned() {
        assert_eq!(
            run(r#"a = 1; b = "noise"; x = a + 1; c = [1, 2, 3]"#),
            TransportValue::Number(2.0)
        );
    }

    #[test]
    fn test_assignment_in_untaken_branch_stays_unbound() {
        assert_eq!(
            run("if df.len() > 100 { x = 1 }"),
            TransportValue::Text(String::new())
        );
        assert_eq!(run("if df.len() > 1 { x = 1 }"), TransportValue::Number(1.0));
    }

    #[test]
    fn test_reading_unassigned_name_fails() {
        let err = evaluate(&sales(), "y = x + 1; x = 2", &EvalLimits::default()).unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_placeholder_cannot_be_read_or_copied() {
        for query in [
            "x = y; y = 1",
            "x = type_of(y); y = 1",
            "x = [y, 2]; y = 1",
            "x = #{v: y}; y = 1",
            "let z = y; x = 1; y = 2",
        ] {
            let err = evaluate(&sales(), query, &EvalLimits::default()).unwrap_err();
            assert!(
                matches!(*err, EvalAltResult::ErrorVariableNotFound(ref name, _) if name == "y"),
                "{query}: {err}"
            );
        }
    }

    #[test]
    fn test_assignment_after_read_of_assigned_name() {
        assert_eq!(run("y = 1; x = y + 1; y = 5"), TransportValue::Number(2.0));
        assert_eq!(run("let y = 1; y = y + 2; x = y"), TransportValue::Number(3.0));
    }

    #[test]
    fn test_assignment_to_constant_is_error() {
        let err = evaluate(&sales(), "const c = 1; c = 2; x = c", &EvalLimits::default())
            .unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorAssignmentToConstant(..)));
    }

    #[test]
    fn test_assignment_inside_function_and_closure() {
        assert_eq!(
            run("fn bump(v) { v = v + 1; v } x = bump(1)"),
            TransportValue::Number(2.0)
        );
        assert_eq!(
            run("total = 0; let add = |v| { total = total + v }; add.call(2); add.call(4); x = total"),
            TransportValue::Number(6.0)
        );
    }

    #[test]
    fn test_missing_column_is_error() {
        let err = evaluate(&sales(), r#"x = df["profit"].sum()"#, &EvalLimits::default())
            .unwrap_err();
        assert!(err.to_string().contains("profit"));
    }

    #[test]
    fn test_syntax_error_is_error() {
        let err = evaluate(&sales(), "x = (1 + ", &EvalLimits::default()).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorParsing(..)));
    }

    #[test]
    fn test_expression_ignoring_df() {
        assert_eq!(run(r#"x = "hello""#), TransportValue::Text("hello".into()));
    }

    #[test]
    fn test_redefining_df_does_not_touch_table() {
        let table = sales();
        let result = evaluate(
            &table,
            r#"df["revenue"] = 0; df["extra"] = 1; x = df["revenue"].sum()"#,
            &EvalLimits::default(),
        )
        .unwrap();
        assert_eq!(coerce(&result), TransportValue::Number(0.0));
        assert_eq!(table, sales());

        let result = evaluate(&table, "df = 5; x = df", &EvalLimits::default()).unwrap();
        assert_eq!(coerce(&result), TransportValue::Number(5.0));
        assert_eq!(table.column_names(), vec!["region", "revenue"]);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let table = sales();
        let query = r#"x = df["revenue"].mean()"#;
        let first = coerce(&evaluate(&table, query, &EvalLimits::default()).unwrap());
        let second = coerce(&evaluate(&table, query, &EvalLimits::default()).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_scope_holds_only_df_and_own_names() {
        let scope = create_scope(&sales(), "x = 1; total = 2; df = 3");
        let names: Vec<String> = scope.iter().map(|(name, _, _)| name.to_string()).collect();
        assert_eq!(names, vec!["df", "x", "total"]);
    }

    #[test]
    fn test_no_ambient_clock_or_eval() {
        assert!(evaluate(&sales(), "x = timestamp()", &EvalLimits::default()).is_err());
        assert!(evaluate(&sales(), r#"x = eval("1 + 1")"#, &EvalLimits::default()).is_err());
        assert!(evaluate(&sales(), r#"import "os" as os; x = 1"#, &EvalLimits::default()).is_err());
    }

    #[test]
    fn test_infinite_loop_hits_operation_limit() {
        let limits = EvalLimits {
            max_operations: 10_000,
            timeout: None,
            ..EvalLimits::default()
        };
        let err = evaluate(&sales(), "loop { }", &limits).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTooManyOperations(..)));
    }

    #[test]
    fn test_infinite_loop_hits_timeout() {
        let limits = EvalLimits {
            max_operations: 0,
            timeout: Some(Duration::from_millis(50)),
            ..EvalLimits::default()
        };
        let err = evaluate(&sales(), "loop { }", &limits).unwrap_err();
        assert!(is_timeout(&err));
    }

    #[test]
    fn test_structured_result_is_text() {
        let TransportValue::Text(text) = run(r#"x = df["region"]"#) else {
            panic!("expected text");
        };
        assert!(text.contains("North"));
        assert!(text.contains("Name: region"));
    }

    #[test]
    fn test_nested_results_render_without_type_paths() {
        let TransportValue::Text(text) = run(r#"x = #{when: datetime("2024-01-02")}"#) else {
            panic!("expected text");
        };
        assert_eq!(text, r#"#{"when": 2024-01-02 00:00:00}"#);

        let TransportValue::Text(text) = run(r#"x = [df["region"].len(), df["region"]]"#) else {
            panic!("expected text");
        };
        assert!(text.starts_with("[4, "));
        assert!(text.contains("Name: region"));
        assert!(!text.contains("::"));
    }

    #[test]
    fn test_missing_cell_result_is_null() {
        assert_eq!(run(r#"x = df["revenue"][2]"#), TransportValue::Null);
    }

    #[test]
    fn test_math_package_available() {
        assert_eq!(
            run(r#"x = (df["revenue"].mean()).round()"#),
            TransportValue::Number(250.0)
        );
    }
}
