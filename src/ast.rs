use indexmap::IndexMap;
use miette::SourceSpan;
use serde::Serialize;
use std::fmt::{self, Display};

pub type NodeId = usize;
pub type TokenId = usize;

/// A positioned lexical unit. `row` and `col` are zero-based; `col` counts bytes from the line start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub offset: usize,
    pub row: usize,
    pub col: usize,
    pub length: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source
            .get(self.offset..self.offset + self.length)
            .unwrap_or_default()
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn span(&self) -> SourceSpan {
        (self.offset, self.length).into()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(IndexMap<String, NodeId>),
    Array(Vec<NodeId>),
}

impl Value {
    pub fn json_type(&self) -> JsonType {
        match self {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Object(_) => JsonType::Object,
            Value::Array(_) => JsonType::Array,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
}

impl JsonType {
    /// The type name with its indefinite article, e.g. `an object`.
    pub fn with_article(&self) -> String {
        match self {
            JsonType::Object | JsonType::Array => format!("an {self}"),
            _ => format!("a {self}"),
        }
    }
}

impl Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Object => "object",
            JsonType::Array => "array",
        };
        f.write_str(name)
    }
}

/// One parsed value plus the tokens it consumed and the clause it was marked with.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueNode {
    pub value: Value,
    /// Tokens read for this value, in order. The first one is the value itself;
    /// delimiters (`:`, `,`, closing brackets) follow.
    pub tokens: Vec<TokenId>,
    /// For an object property's value, the node holding the property name.
    pub key: Option<NodeId>,
    /// Set on nodes read in property name position, even when no value follows.
    pub is_property_name: bool,
    pub clause: Option<String>,
    pub delegate_clause: Option<String>,
}

impl ValueNode {
    pub(crate) fn new() -> Self {
        Self {
            value: Value::Null,
            tokens: Vec::new(),
            key: None,
            is_property_name: false,
            clause: None,
            delegate_clause: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub token: TokenId,
    pub message: String,
}

/// The output of a parse: an arena of value nodes plus the flat token and diagnostic lists.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub root: NodeId,
    pub nodes: Vec<ValueNode>,
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn node(&self, id: NodeId) -> &ValueNode {
        &self.nodes[id]
    }

    pub fn root_node(&self) -> &ValueNode {
        &self.nodes[self.root]
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id]
    }

    pub fn value(&self, id: NodeId) -> &Value {
        &self.nodes[id].value
    }

    /// The token diagnostics about this node are anchored to.
    pub fn first_token(&self, id: NodeId) -> TokenId {
        self.nodes[id].tokens.first().copied().unwrap_or_default()
    }

    /// Direct children: array elements or object property values, in document order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id].value {
            Value::Array(items) => items.clone(),
            Value::Object(properties) => properties.values().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Looks up an object property's value node by name.
    pub fn property(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match &self.nodes[id].value {
            Value::Object(properties) => properties.get(name).copied(),
            _ => None,
        }
    }

    /// Follows a path of property names and array indices from the root.
    pub fn lookup(&self, path: &[&str]) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path {
            current = match &self.nodes[current].value {
                Value::Object(properties) => *properties.get(*segment)?,
                Value::Array(items) => *items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// The clause a node was ultimately interpreted as: the variant's chosen delegate if any.
    pub fn resolved_clause(&self, id: NodeId) -> Option<&str> {
        let node = &self.nodes[id];
        node.delegate_clause
            .as_deref()
            .or(node.clause.as_deref())
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Diagnostic messages in order, convenient for assertions and logging.
    pub fn messages(&self) -> Vec<&str> {
        self.diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message.as_str())
            .collect()
    }
}
