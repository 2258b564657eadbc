use crate::ast::{Diagnostic, Document, NodeId, Token, TokenId, Value, ValueNode};
use crate::scanner::Scanner;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^"(?:\\(?:["\\/bfnrt]|u[a-fA-F0-9]{4})|[^"\\\x00-\x1F\x7F])*""#)
        .expect("string pattern")
});
static STRING_TO_QUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"(?:\\.|[^"\\])*""#).expect("quoted run pattern"));
static STRING_TO_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"[^,:\[\]{}\n]*"#).expect("unterminated string pattern"));
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?").expect("number pattern")
});
static NUMBER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+.eE0-9]+").expect("number run pattern"));
static TRUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^true").expect("true pattern"));
static FALSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^false").expect("false pattern"));
static NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^null").expect("null pattern"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+").expect("word pattern"));

/// Parses `source` into a [`Document`]. Never fails: malformed input is recorded as diagnostics.
pub fn parse(source: &str) -> Document {
    Parser::new(source).parse()
}

/// An instrumented, error-recovering recursive descent reader for JSON-shaped query text.
///
/// Every value read opens a [`ValueNode`] and a [`Token`]. Values that turn out not to
/// exist (a closing bracket where a value could have been) are discarded by popping
/// both, so the arena never holds half-built nodes.
#[derive(Debug)]
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    nodes: Vec<ValueNode>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    // nodes currently being read, innermost last
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            scanner: Scanner::new(source),
            nodes: Vec::new(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Document {
        let root = match self.read_value() {
            Some(root) => root,
            None => {
                let root = self.begin_node();
                self.accumulate_token();
                self.stack.pop();
                if self.scanner.is_at_end() {
                    self.error_on_current_token(
                        "Expected a value, but reached the end of the query string",
                    );
                }
                root
            }
        };

        if self.scanner.peek().is_some() {
            let token = self.accumulate_token_on(root);
            self.scanner.advance(1);
            self.finish_token(token);
            self.error_on_current_token("Unexpected token at the end of the query string");
        }

        log::debug!(
            "parsed {} values, {} tokens, {} diagnostics",
            self.nodes.len(),
            self.tokens.len(),
            self.diagnostics.len()
        );

        Document {
            source: self.scanner.input().to_string(),
            root,
            nodes: self.nodes,
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    // === Value Readers ===

    /// Value ::= String | Number | Object | Array | "true" | "false" | "null"
    ///
    /// Returns `None` only when no value starts here (end of input or a closing bracket).
    fn read_value(&mut self) -> Option<NodeId> {
        let next = self.scanner.peek();
        let node = self.begin_node();
        let token = self.accumulate_token();

        let value = match next {
            None | Some('}') | Some(']') => None,
            Some('"') => {
                let text = self.read_string();
                self.finish_token(token);
                Some(Value::String(text))
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let number = self.read_number();
                self.finish_token(token);
                Some(Value::Number(number))
            }
            Some('{') => {
                self.scanner.advance(1);
                self.finish_token(token);
                Some(self.read_object(node))
            }
            Some('[') => {
                self.scanner.advance(1);
                self.finish_token(token);
                Some(self.read_array(node))
            }
            Some('t') => Some(self.read_literal(&TRUE, Value::Bool(true), Value::Bool(false), token)),
            Some('f') => Some(self.read_literal(&FALSE, Value::Bool(false), Value::Bool(false), token)),
            Some('n') => Some(self.read_literal(&NULL, Value::Null, Value::Null, token)),
            Some(_) => {
                self.error_on_current_token("Unknown token found when expecting a value");
                self.scanner.advance(1);
                self.finish_token(token);
                Some(Value::Null)
            }
        };

        self.stack.pop();
        match value {
            Some(value) => {
                self.nodes[node].value = value;
                Some(node)
            }
            None => {
                debug_assert_eq!(self.nodes.len(), node + 1);
                debug_assert_eq!(self.tokens.len(), token + 1);
                self.tokens.pop();
                self.nodes.pop();
                None
            }
        }
    }

    fn read_string(&mut self) -> String {
        if let Some(raw) = self.scanner.match_regex(&STRING) {
            return match serde_json::from_str::<String>(raw) {
                Ok(text) => text,
                Err(_) => {
                    self.error_on_current_token("Unknown string format");
                    String::new()
                }
            };
        }

        self.error_on_current_token("Unknown string format");
        if self.scanner.match_regex(&STRING_TO_QUOTE).is_none() {
            self.scanner.match_regex(&STRING_TO_DELIMITER);
        }
        String::new()
    }

    fn read_number(&mut self) -> f64 {
        if let Some(raw) = self.scanner.match_regex(&NUMBER) {
            if let Ok(number) = raw.parse::<f64>() {
                return number;
            }
        }

        self.error_on_current_token("Unknown number format");
        self.scanner.match_regex(&NUMBER_RUN);
        0.0
    }

    fn read_literal(&mut self, pattern: &Regex, value: Value, fallback: Value, token: TokenId) -> Value {
        let matched = self.scanner.match_regex(pattern).is_some();
        if !matched {
            self.error_on_current_token(
                "Unknown value type, possibly a boolean or null (true, false, and null are valid).",
            );
            self.scanner.match_regex(&WORD);
        }
        self.finish_token(token);
        if matched {
            value
        } else {
            fallback
        }
    }

    /// Array ::= "[" [ Value { "," Value } ] "]"
    fn read_array(&mut self, array: NodeId) -> Value {
        let mut items = Vec::new();
        let mut after_comma = false;

        while let Some(element) = self.read_value() {
            after_comma = false;
            items.push(element);

            if self.scanner.peek() != Some(',') {
                break;
            }
            self.accumulate_delimiter(element);
            after_comma = true;
        }

        if after_comma {
            self.error_on_current_token("Trailing comma is not allowed");
        }

        if self.scanner.peek() == Some(']') {
            self.accumulate_delimiter(array);
        } else {
            self.error_on_current_token("Missing or misplaced array closing bracket, \"]\"");
        }

        Value::Array(items)
    }

    /// Object ::= "{" [ Member { "," Member } ] "}"
    /// Member ::= String ":" Value
    fn read_object(&mut self, object: NodeId) -> Value {
        let mut properties: IndexMap<String, NodeId> = IndexMap::new();
        let mut after_comma = false;

        while let Some(name_node) = self.read_value() {
            after_comma = false;
            self.nodes[name_node].is_property_name = true;

            let name_value = &self.nodes[name_node].value;
            let name = property_name_of(name_value);
            if !matches!(name_value, Value::String(_)) {
                let message = format!(
                    "Object property names must be strings, but found {} instead",
                    name_value.json_type().with_article()
                );
                self.error_on_current_token(&message);
            }

            if properties.contains_key(&name) {
                self.error_on_current_token("Duplicate property names are not allowed");
            }

            match self.scanner.peek() {
                Some(':') => {}
                Some(',') => {
                    self.error_on_current_token("Object property's value is missing");
                    self.accumulate_delimiter(name_node);
                    after_comma = true;
                    continue;
                }
                _ => break,
            }
            self.accumulate_delimiter(name_node);

            let Some(value_node) = self.read_value() else {
                self.error_on_current_token("Object property's value is missing");
                break;
            };
            self.nodes[value_node].key = Some(name_node);
            properties.insert(name, value_node);

            if self.scanner.peek() != Some(',') {
                break;
            }
            self.accumulate_delimiter(name_node);
            after_comma = true;
        }

        if after_comma {
            self.error_on_current_token("Trailing comma is not allowed");
        }

        if self.scanner.peek() == Some('}') {
            self.accumulate_delimiter(object);
        } else {
            self.error_on_current_token("Missing or misplaced object closing brace, \"}\"");
        }

        Value::Object(properties)
    }

    // === Bookkeeping Helpers ===

    fn begin_node(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(ValueNode::new());
        self.stack.push(id);
        id
    }

    /// Opens a token at the cursor on the innermost open node.
    fn accumulate_token(&mut self) -> TokenId {
        let node = self.stack.last().copied().unwrap_or_default();
        self.accumulate_token_on(node)
    }

    fn accumulate_token_on(&mut self, node: NodeId) -> TokenId {
        let (row, col) = self.scanner.position();
        let id = self.tokens.len();
        self.tokens.push(Token {
            offset: self.scanner.offset(),
            row,
            col,
            length: 0,
        });
        self.nodes[node].tokens.push(id);
        id
    }

    /// Records the single-character delimiter under the cursor on `node` and steps over it.
    fn accumulate_delimiter(&mut self, node: NodeId) {
        let token = self.accumulate_token_on(node);
        self.scanner.advance(1);
        self.finish_token(token);
    }

    fn finish_token(&mut self, token: TokenId) {
        let offset = self.scanner.offset();
        let entry = &mut self.tokens[token];
        entry.length = offset.saturating_sub(entry.offset);
    }

    fn error_on_current_token(&mut self, message: &str) {
        self.diagnostics.push(Diagnostic {
            token: self.tokens.len().saturating_sub(1),
            message: message.to_string(),
        });
    }
}

/// Best-effort property name for a non-string key.
fn property_name_of(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => value.json_type().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Document {
        let document = parse(source);
        assert!(
            document.diagnostics.is_empty(),
            "unexpected diagnostics for {source:?}: {:?}",
            document.messages()
        );
        document
    }

    #[test]
    fn test_empty_object() {
        let doc = parse_ok("{}");
        assert_eq!(doc.root_node().value, Value::Object(IndexMap::new()));
        assert_eq!(doc.tokens.len(), 2);
    }

    #[test]
    fn test_empty_array_discards_terminator() {
        let doc = parse_ok("[]");
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.tokens.len(), 2);
        assert_eq!(doc.root_node().tokens, vec![0, 1]);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse_ok("42").root_node().value, Value::Number(42.0));
        assert_eq!(parse_ok("-1.5e2").root_node().value, Value::Number(-150.0));
        assert_eq!(parse_ok("true").root_node().value, Value::Bool(true));
        assert_eq!(parse_ok("false").root_node().value, Value::Bool(false));
        assert_eq!(parse_ok("null").root_node().value, Value::Null);
        assert_eq!(
            parse_ok(r#""hi""#).root_node().value,
            Value::String("hi".to_string())
        );
    }

    #[test]
    fn test_string_escapes() {
        let doc = parse_ok(r#"["a\"b", "A", "tab\tstop"]"#);
        let items = doc.children(doc.root);
        assert_eq!(doc.value(items[0]), &Value::String("a\"b".to_string()));
        assert_eq!(doc.value(items[1]), &Value::String("A".to_string()));
        assert_eq!(doc.value(items[2]), &Value::String("tab\tstop".to_string()));
    }

    #[test]
    fn test_nested_tokens_are_ordered_and_disjoint() {
        let doc = parse_ok(r#"{"a":1,"b":[true,null]}"#);
        let lengths: Vec<usize> = doc.tokens.iter().map(|t| t.length).collect();
        assert_eq!(lengths, vec![1, 3, 1, 1, 1, 3, 1, 1, 4, 1, 4, 1, 1]);
        for pair in doc.tokens.windows(2) {
            assert!(pair[0].end() <= pair[1].offset);
        }
        assert_eq!(doc.nodes.len(), 7);
    }

    #[test]
    fn test_delimiters_attach_to_property_name() {
        let doc = parse_ok(r#"{"a": 1, "b": 2}"#);
        let a = doc.property(doc.root, "a").unwrap();
        let name = doc.node(a).key.unwrap();
        let texts: Vec<&str> = doc
            .node(name)
            .tokens
            .iter()
            .map(|t| doc.token(*t).text(&doc.source))
            .collect();
        assert_eq!(texts, vec![r#""a""#, ":", ","]);
    }

    #[test]
    fn test_token_rows_and_columns() {
        let doc = parse_ok("{\n  \"a\": [1,\n    2]\n}");
        let two = doc.lookup(&["a", "1"]).unwrap();
        let token = doc.token(doc.first_token(two));
        assert_eq!((token.row, token.col), (2, 4));
        let closing = doc.tokens.last().unwrap();
        assert_eq!((closing.row, closing.col), (3, 0));
    }

    #[test]
    fn test_empty_input() {
        let doc = parse("");
        assert_eq!(doc.root_node().value, Value::Null);
        assert_eq!(
            doc.messages(),
            vec!["Expected a value, but reached the end of the query string"]
        );
        assert_eq!(doc.tokens.len(), 1);
        assert_eq!(doc.tokens[0].length, 0);
    }

    #[test]
    fn test_missing_closing_brace() {
        let doc = parse(r#"{"a": 1"#);
        assert_eq!(doc.messages(), vec!["Missing or misplaced object closing brace, \"}\""]);
        assert!(doc.property(doc.root, "a").is_some());
    }

    #[test]
    fn test_missing_closing_bracket() {
        let doc = parse("[1, 2");
        assert_eq!(doc.messages(), vec!["Missing or misplaced array closing bracket, \"]\""]);
        assert_eq!(doc.children(doc.root).len(), 2);
    }

    #[test]
    fn test_missing_property_value() {
        let doc = parse(r#"{"a": }"#);
        assert_eq!(doc.messages(), vec!["Object property's value is missing"]);
        assert!(doc.property(doc.root, "a").is_none());
    }

    #[test]
    fn test_property_without_colon_before_comma() {
        let doc = parse(r#"{"a", "b": 2}"#);
        assert_eq!(doc.messages(), vec!["Object property's value is missing"]);
        assert!(doc.property(doc.root, "b").is_some());
    }

    #[test]
    fn test_dangling_commas() {
        assert_eq!(parse(r#"{"a": 1,}"#).messages(), vec!["Trailing comma is not allowed"]);
        assert_eq!(parse("[1,]").messages(), vec!["Trailing comma is not allowed"]);
    }

    #[test]
    fn test_non_string_property_name_is_coerced() {
        let doc = parse("{1: true}");
        assert_eq!(
            doc.messages(),
            vec!["Object property names must be strings, but found a number instead"]
        );
        assert!(doc.property(doc.root, "1").is_some());
    }

    #[test]
    fn test_duplicate_property_names() {
        let doc = parse(r#"{"a": 1, "a": 2}"#);
        assert_eq!(doc.messages(), vec!["Duplicate property names are not allowed"]);
        let a = doc.property(doc.root, "a").unwrap();
        assert_eq!(doc.value(a), &Value::Number(2.0));
    }

    #[test]
    fn test_malformed_literals_default() {
        let doc = parse("tru");
        assert_eq!(doc.root_node().value, Value::Bool(false));
        assert_eq!(doc.tokens[0].length, 3);

        let doc = parse("-");
        assert_eq!(doc.messages(), vec!["Unknown number format"]);
        assert_eq!(doc.root_node().value, Value::Number(0.0));

        let doc = parse("nul");
        assert_eq!(doc.root_node().value, Value::Null);
    }

    #[test]
    fn test_unterminated_string_stops_at_delimiter() {
        let doc = parse(r#"["abc, 1]"#);
        assert_eq!(doc.messages()[0], "Unknown string format");
        let items = doc.children(doc.root);
        assert_eq!(doc.value(items[0]), &Value::String(String::new()));
        assert_eq!(doc.value(items[1]), &Value::Number(1.0));
    }

    #[test]
    fn test_unknown_token_yields_null() {
        let doc = parse("[@, 1]");
        assert_eq!(doc.messages(), vec!["Unknown token found when expecting a value"]);
        let items = doc.children(doc.root);
        assert_eq!(doc.value(items[0]), &Value::Null);
        assert_eq!(doc.value(items[1]), &Value::Number(1.0));
    }

    #[test]
    fn test_trailing_text() {
        let doc = parse(r#"{"a": 1} x"#);
        assert_eq!(doc.messages(), vec!["Unexpected token at the end of the query string"]);
        let last = doc.tokens.last().unwrap();
        assert_eq!(last.text(&doc.source), "x");
    }

    #[test]
    fn test_every_node_has_a_token() {
        for source in ["", "}", "[", "{\"a\"", "[1,,2]", "{:}", "\"", "-e", "@@@"] {
            let doc = parse(source);
            for node in &doc.nodes {
                assert!(!node.tokens.is_empty(), "{source:?}");
            }
            for diagnostic in &doc.diagnostics {
                assert!(diagnostic.token < doc.tokens.len(), "{source:?}");
            }
        }
    }
}
