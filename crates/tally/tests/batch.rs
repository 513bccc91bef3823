//! End-to-end tests for batch validation and execution

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use tally::prelude::*;
use tally::{coerce, ExprError};

fn request(json: serde_json::Value) -> FormulaRequest {
    serde_json::from_value(json).unwrap()
}

fn numbers(values: &[Value]) -> Vec<f64> {
    values.iter().map(|v| v.as_number().unwrap()).collect()
}

/// Records `[{fieldA: 10}, {fieldA: 20}]` and `result = fieldA + 10`
#[test]
fn test_chaining_correctness() {
    let req = FormulaRequest::new(
        vec![Record::from([("fieldA", 10)]), Record::from([("fieldA", 20)])],
        vec![Formula::new("result", "fieldA + 10").input("fieldA", TypeTag::Number)],
    );

    let response = run_batch(&req).unwrap();
    assert_eq!(numbers(response.results.get("result").unwrap()), vec![20.0, 30.0]);
}

#[test]
fn test_chained_outputs_across_formulas() {
    let req = request(json!({
        "data": [
            {"id": 1, "price": "$1,200.00", "discount": "10%", "qty": 2},
            {"id": 2, "price": "EUR 50", "discount": "0%", "qty": "3"}
        ],
        "formulas": [
            {
                "outputVar": "gross",
                "expression": "price * qty",
                "inputs": [
                    {"varName": "price", "varType": "currency"},
                    {"varName": "qty", "varType": "number"}
                ]
            },
            {
                "outputVar": "net",
                "expression": "gross - gross * discount / 100",
                "inputs": [
                    {"varName": "gross", "varType": "number"},
                    {"varName": "discount", "varType": "percentage"}
                ]
            },
            {
                "outputVar": "large",
                "expression": "net > 1000",
                "inputs": [{"varName": "net", "varType": "number"}]
            }
        ]
    }));

    let response = run_batch(&req).unwrap();
    assert_eq!(numbers(response.results.get("gross").unwrap()), vec![2400.0, 150.0]);
    assert_eq!(numbers(response.results.get("net").unwrap()), vec![2160.0, 150.0]);
    assert_eq!(
        response.results.get("large").unwrap(),
        &[Value::Boolean(true), Value::Boolean(false)]
    );
}

#[test]
fn test_success_response_wire_format() {
    let req = request(json!({
        "data": [{"id": 1, "fieldA": 10}, {"id": 2, "fieldA": 20}],
        "formulas": [{
            "outputVar": "result",
            "expression": "fieldA + 10",
            "inputs": [{"varName": "fieldA", "varType": "number"}]
        }]
    }));

    let response = run_batch(&req).unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "results": {"result": [20.0, 30.0]},
            "status": "success",
            "message": "The formulas were executed successfully with variable-based chaining."
        })
    );
}

#[test]
fn test_result_columns_follow_declaration_order() {
    let req = FormulaRequest::new(
        vec![Record::from([("a", 1)])],
        vec![
            Formula::new("zeta", "a + 1").input("a", TypeTag::Number),
            Formula::new("alpha", "zeta + 1").input("zeta", TypeTag::Number),
            Formula::new("mid", "alpha + 1").input("alpha", TypeTag::Number),
        ],
    );

    let response = run_batch(&req).unwrap();
    let text = serde_json::to_string(&response.results).unwrap();
    assert_eq!(text, r#"{"zeta":[2.0],"alpha":[3.0],"mid":[4.0]}"#);
}

#[test]
fn test_self_reference_rejected_regardless_of_other_formulas() {
    let req = FormulaRequest::new(
        vec![Record::from([("a", 1), ("x", 5)])],
        vec![
            Formula::new("b", "a * 2").input("a", TypeTag::Number),
            Formula::new("x", "x + b")
                .input("b", TypeTag::Number)
                .input("x", TypeTag::Number),
        ],
    );

    let err = run_batch(&req).unwrap_err();
    assert_eq!(
        err,
        BatchError::SelfReference {
            formula: "x".into()
        }
    );
}

#[test]
fn test_unresolved_variable_rejected_before_execution() {
    // The second record would fail execution; validation must win.
    let req = FormulaRequest::new(
        vec![Record::from([("a", 1)]), Record::from([("b", 1)])],
        vec![Formula::new("out", "a + v")
            .input("a", TypeTag::Number)
            .input("v", TypeTag::Number)],
    );

    let err = run_batch(&req).unwrap_err();
    assert_eq!(
        err,
        BatchError::UnresolvedVariable {
            variable: "v".into(),
            formula: "out".into(),
        }
    );
}

#[test]
fn test_self_referencing_unknown_name_is_unresolved() {
    let req = FormulaRequest::new(
        vec![Record::from([("a", 1)])],
        vec![Formula::new("x", "x + 1").input("x", TypeTag::Number)],
    );

    let err = run_batch(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedVariable);
    assert_eq!(err.variable(), Some("x"));
}

#[test]
fn test_deeply_nested_expression_is_a_syntax_error() {
    let nested = format!("{}a{}", "(".repeat(500), ")".repeat(500));
    let chain = vec!["a"; 200_000].join(" + ");

    for expression in [nested, chain] {
        let req = FormulaRequest::new(
            vec![Record::from([("a", 1)])],
            vec![Formula::new("out", expression).input("a", TypeTag::Number)],
        );
        let err = run_batch(&req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormulaSyntax);
    }
}

#[test]
fn test_round_with_huge_negative_digits() {
    let req = FormulaRequest::new(
        vec![Record::from([("a", 1234.5)])],
        vec![Formula::new("r", "round(a, -1e10)").input("a", TypeTag::Number)],
    );

    let response = run_batch(&req).unwrap();
    assert_eq!(response.results.get("r"), Some(&[Value::Number(0.0)][..]));
}

#[test]
fn test_missing_field_is_fail_fast() {
    let req = request(json!({
        "data": [
            {"id": 1, "fieldA": 10, "fieldB": 30},
            {"id": 2, "fieldA": 20}
        ],
        "formulas": [{
            "outputVar": "result",
            "expression": "fieldA + fieldB",
            "inputs": [
                {"varName": "fieldA", "varType": "number"},
                {"varName": "fieldB", "varType": "number"}
            ]
        }]
    }));

    let err = run_batch(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingField);
    assert_eq!(
        err.to_string(),
        "Variable 'fieldB' not found in data item with id 2"
    );

    let report = ErrorReport::from(&err);
    assert_eq!(report.record.map(|r| r.index), Some(1));
}

#[test]
fn test_conversion_error() {
    let req = request(json!({
        "data": [{"id": 1, "fieldA": "Ten", "fieldB": 30}],
        "formulas": [{
            "outputVar": "result",
            "expression": "fieldA + fieldB",
            "inputs": [
                {"varName": "fieldA", "varType": "number"},
                {"varName": "fieldB", "varType": "number"}
            ]
        }]
    }));

    let err = run_batch(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert!(err.to_string().starts_with("Error while converting variable"));
}

#[test]
fn test_formula_syntax_error() {
    let req = request(json!({
        "data": [{"id": 1, "fieldA": 10, "fieldB": 30}],
        "formulas": [{
            "outputVar": "result",
            "expression": "fieldA +",
            "inputs": [
                {"varName": "fieldA", "varType": "number"},
                {"varName": "fieldB", "varType": "number"}
            ]
        }]
    }));

    let err = run_batch(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormulaSyntax);
    assert!(err.to_string().contains("Error evaluating expression"));
    match err {
        BatchError::FormulaSyntax { source, .. } => {
            assert!(matches!(source, ExprError::Parse(_)));
        }
        other => panic!("Expected FormulaSyntax, got {:?}", other),
    }
}

#[test]
fn test_empty_inputs() {
    let formulas = vec![Formula::new("result1", "var1 + var2")
        .raw_input("var1", "int")
        .raw_input("var2", "int")];

    // Empty data wins even though the formulas are also invalid
    let err = run_batch(&FormulaRequest::new(vec![], formulas)).unwrap_err();
    assert_eq!(err, BatchError::EmptyData);
    assert_eq!(err.kind(), ErrorKind::EmptyInput);

    let err = run_batch(&FormulaRequest::new(
        vec![Record::from([("id", 1), ("var1", 10), ("var2", 5)])],
        vec![],
    ))
    .unwrap_err();
    assert_eq!(err.to_string(), "Empty formulas");
    assert_eq!(err.kind(), ErrorKind::EmptyInput);
}

#[test]
fn test_unsupported_type_error_report() {
    let req = FormulaRequest::new(
        vec![Record::from([("id", 1), ("var1", 10)])],
        vec![Formula::new("result1", "var1 * 2").raw_input("var1", "int")],
    );

    let err = run_batch(&req).unwrap_err();
    let report = serde_json::to_value(ErrorReport::from(&err)).unwrap();
    assert_eq!(report["kind"], "UnsupportedTypeError");
    assert_eq!(report["formula"], "result1");
    assert_eq!(report["variable"], "var1");
    assert!(report.get("record").is_none());
}

#[test]
fn test_evaluation_error_report() {
    let req = request(json!({
        "data": [{"id": "a-1", "label": "x"}, {"id": "a-2", "label": "y"}],
        "formulas": [{
            "outputVar": "flag",
            "expression": "label and True",
            "inputs": [{"varName": "label", "varType": "datetime"}]
        }]
    }));

    // "x" is not a date
    let err = run_batch(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);

    // Passes the dry run with a numeric placeholder, fails on a real timestamp
    let req = request(json!({
        "data": [{"id": "a-1", "d": "2024-01-01"}],
        "formulas": [{
            "outputVar": "bad",
            "expression": "d - 1",
            "inputs": [{"varName": "d", "varType": "datetime"}]
        }]
    }));

    let err = run_batch(&req).unwrap_err();
    let report = serde_json::to_value(ErrorReport::from(&err)).unwrap();
    assert_eq!(report["kind"], "EvaluationError");
    assert_eq!(report["record"], json!({"index": 0, "id": "a-1"}));
}

#[test]
fn test_boolean_and_datetime_inputs() {
    let req = request(json!({
        "data": [
            {"start": "2024-01-01", "end": "2024-01-31T12:00:00", "active": 1},
            {"start": "2024-02-01", "end": "2024-02-11", "active": ""}
        ],
        "formulas": [
            {
                "outputVar": "days",
                "expression": "end - start",
                "inputs": [
                    {"varName": "start", "varType": "datetime"},
                    {"varName": "end", "varType": "datetime"}
                ]
            },
            {
                "outputVar": "billable",
                "expression": "where(active, days, 0)",
                "inputs": [
                    {"varName": "active", "varType": "boolean"},
                    {"varName": "days", "varType": "number"}
                ]
            }
        ]
    }));

    let response = run_batch(&req).unwrap();
    assert_eq!(numbers(response.results.get("days").unwrap()), vec![30.5, 10.0]);
    assert_eq!(numbers(response.results.get("billable").unwrap()), vec![30.5, 0.0]);
}

#[test]
fn test_sequential_and_parallel_agree() {
    let records: Vec<Record> = (0..3000)
        .map(|i| Record::from([("id", Value::from(i)), ("amount", Value::from(format!("${}.25", i)))]))
        .collect();
    let formulas = vec![
        Formula::new("amount_num", "amount").input("amount", TypeTag::Currency),
        Formula::new("bucket", "floor(amount_num / 100) % 7").input("amount_num", TypeTag::Number),
    ];
    let req = FormulaRequest::new(records, formulas);

    let sequential = run_batch_with(&NativeEngine, &req, &ExecutionOptions::sequential()).unwrap();
    let parallel = run_batch_with(
        &NativeEngine,
        &req,
        &ExecutionOptions::default()
            .with_parallel(true)
            .with_min_parallel_records(1),
    )
    .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(sequential.results.record_count(), 3000);
}

#[test]
fn test_percentage_is_not_normalized() {
    assert_eq!(
        coerce(&Value::from("50%"), TypeTag::Percentage).unwrap(),
        Value::Number(50.0)
    );
}

#[test]
fn test_currency_tolerates_symbols_and_separators() {
    for text in ["USD 1,234.50", "$1234.50"] {
        assert_eq!(
            coerce(&Value::from(text), TypeTag::Currency).unwrap(),
            Value::Number(1234.5),
            "{text}"
        );
    }
}

fn bits(results: &ResultSet) -> Vec<(String, Vec<u64>)> {
    results
        .iter()
        .map(|(name, values)| {
            let bits = values
                .iter()
                .map(|v| v.as_number().map_or(u64::MAX, f64::to_bits))
                .collect();
            (name.to_string(), bits)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_currency_parses_formatted_amounts(
        whole in 0u64..10_000_000,
        cents in 0u64..100,
        code in prop::sample::select(vec!["", "USD ", "EUR", "$", "USD $", "gbp "]),
    ) {
        let digits = format!("{}.{:02}", whole, cents);
        let text = format!("{}{}", code, digits);
        let parsed = coerce(&Value::from(text.as_str()), TypeTag::Currency).unwrap();
        prop_assert_eq!(parsed, Value::Number(digits.parse::<f64>().unwrap()));
    }

    #[test]
    fn prop_percentage_keeps_magnitude(n in -1.0e6f64..1.0e6) {
        let text = format!("{}%", n);
        prop_assert_eq!(
            coerce(&Value::from(text.as_str()), TypeTag::Percentage).unwrap(),
            Value::Number(n)
        );
    }

    #[test]
    fn prop_execution_is_idempotent(values in prop::collection::vec(-1.0e9f64..1.0e9, 1..50)) {
        let records: Vec<Record> = values.iter().map(|v| Record::from([("x", *v)])).collect();
        let formulas = vec![
            Formula::new("y", "x ** 2 - 3 * x").input("x", TypeTag::Number),
            Formula::new("z", "where(y > 0, sqrt(y), -y) / 7").input("y", TypeTag::Number),
        ];
        let req = FormulaRequest::new(records, formulas);

        let first = run_batch(&req).unwrap();
        let second = run_batch(&req).unwrap();
        prop_assert_eq!(bits(&first.results), bits(&second.results));
    }
}
