// Parser error paths: every malformed query still yields a document plus diagnostics.

use eql_core::ast::Value;
use eql_core::parse;

fn messages(source: &str) -> Vec<String> {
    parse(source)
        .diagnostics
        .into_iter()
        .map(|d| d.message)
        .collect()
}

#[test]
fn test_parser_error_missing_closing_brace() {
    assert_eq!(
        messages(r#"{ "key": 123"#),
        vec!["Missing or misplaced object closing brace, \"}\""]
    );
}

#[test]
fn test_parser_error_missing_closing_bracket() {
    // The `}` is left for the enclosing object, which still closes cleanly.
    let document = parse(r#"{ "arr": [1, 2, 3 }"#);
    assert_eq!(
        document.messages(),
        vec!["Missing or misplaced array closing bracket, \"]\""]
    );
    assert_eq!(document.lookup(&["arr", "2"]).map(|n| document.value(n).clone()), Some(Value::Number(3.0)));
}

#[test]
fn test_parser_error_missing_colon() {
    let document = parse(r#"{ "key" 123 }"#);
    assert!(document.has_errors());
    assert_eq!(
        document.messages().last().copied(),
        Some("Unexpected token at the end of the query string")
    );
}

#[test]
fn test_parser_error_unexpected_eof() {
    assert_eq!(
        messages(r#"{ "key": "#),
        vec![
            "Object property's value is missing",
            "Missing or misplaced object closing brace, \"}\"",
        ]
    );
}

#[test]
fn test_parser_error_bad_number() {
    let document = parse("[-x]");
    assert_eq!(document.messages()[0], "Unknown number format");
    let first = document.lookup(&["0"]).unwrap();
    assert_eq!(document.value(first), &Value::Number(0.0));
}

#[test]
fn test_parser_error_bad_literal() {
    let document = parse(r#"{"flag": yes}"#);
    assert!(document.has_errors());

    let document = parse(r#"{"flag": folse}"#);
    assert_eq!(
        document.messages(),
        vec!["Unknown value type, possibly a boolean or null (true, false, and null are valid)."]
    );
    let flag = document.lookup(&["flag"]).unwrap();
    assert_eq!(document.value(flag), &Value::Bool(false));
}

#[test]
fn test_parser_error_invalid_escape() {
    let document = parse(r#"["bad \q escape", 2]"#);
    assert_eq!(document.messages(), vec!["Unknown string format"]);
    assert_eq!(document.children(document.root).len(), 2);
}

#[test]
fn test_parser_error_control_character_in_string() {
    let document = parse("[\"line\nbreak\"]");
    assert_eq!(document.messages()[0], "Unknown string format");
}

#[test]
fn test_multiple_errors_in_one_pass() {
    let document = parse(r#"{"a": tru, "b": [1,], "c": @}"#);
    let messages = document.messages();
    assert_eq!(messages.len(), 3, "{messages:?}");
    assert!(messages[0].starts_with("Unknown value type"));
    assert_eq!(messages[1], "Trailing comma is not allowed");
    assert_eq!(messages[2], "Unknown token found when expecting a value");

    // Diagnostics are reported in source order.
    let offsets: Vec<usize> = document
        .diagnostics
        .iter()
        .map(|d| document.token(d.token).offset)
        .collect();
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_garbage_never_panics() {
    let inputs = [
        "",
        "   ",
        "{",
        "}",
        "[[[[",
        "]]]]",
        "{\"a\":{\"b\":{\"c\":",
        ",,,",
        ":::",
        "\"\\u12\"",
        "{\"a\" \"b\"}",
        "[1 2 3]",
        "nulltrue",
        "é",
        "{\"ключ\": \"значение\"",
    ];
    for source in inputs {
        let document = parse(source);
        assert!(document.root < document.nodes.len(), "{source:?}");
        for diagnostic in &document.diagnostics {
            assert!(diagnostic.token < document.tokens.len(), "{source:?}");
        }
    }
}

#[test]
fn test_valid_document_round_trip() {
    let document = parse(r#"{"a":1,"b":[true,null]}"#);
    assert!(!document.has_errors());

    let a = document.lookup(&["a"]).unwrap();
    assert_eq!(document.value(a), &Value::Number(1.0));
    let b0 = document.lookup(&["b", "0"]).unwrap();
    let b1 = document.lookup(&["b", "1"]).unwrap();
    assert_eq!(document.value(b0), &Value::Bool(true));
    assert_eq!(document.value(b1), &Value::Null);
}

#[test]
fn test_tokens_are_ordered_and_disjoint() {
    let source = r#"
        {
            "name": "query",
            "limit": 10,
            "filters": [{"field": "age", "op": "gt", "value": 21.5}, null],
            "flags": {"a": true, "b": false}
        }
    "#;
    let document = parse(source);
    assert!(!document.has_errors());
    for pair in document.tokens.windows(2) {
        assert!(pair[0].end() <= pair[1].offset);
    }
    for token in &document.tokens {
        let (row, col) = (token.row, token.col);
        let line_start: usize = source
            .split('\n')
            .take(row)
            .map(|line| line.len() + 1)
            .sum();
        assert_eq!(line_start + col, token.offset);
    }
}
