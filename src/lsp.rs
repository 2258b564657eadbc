use crate::ast::{Document, NodeId, Value};
use miette::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundNode {
    Value(NodeId),
    /// The cursor is on a property name; `value` is the property's value node.
    PropertyName { name: NodeId, value: NodeId },
}

impl FoundNode {
    /// The value node the cursor refers to.
    pub fn value(&self) -> NodeId {
        match self {
            FoundNode::Value(node) => *node,
            FoundNode::PropertyName { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticTokenType {
    Property, // object keys
    String,
    Number,
    Boolean,
    Null,
    Object, // opening brace
    Array,  // opening bracket
    Punctuation,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SemanticToken {
    pub span: SourceSpan,
    pub token_type: SemanticTokenType,
}

/// The byte span covering a node, the delimiters attached to it, and every descendant.
pub fn node_span(document: &Document, node: NodeId) -> SourceSpan {
    let mut start = usize::MAX;
    let mut end = 0;
    let mut pending = vec![node];

    while let Some(current) = pending.pop() {
        for token in &document.node(current).tokens {
            let token = document.token(*token);
            start = start.min(token.offset);
            end = end.max(token.end());
        }
        for child in document.children(current) {
            pending.extend(document.node(child).key);
            pending.push(child);
        }
    }

    if start == usize::MAX {
        return (0, 0).into();
    }
    (start, end - start).into()
}

fn span_contains(span: SourceSpan, offset: usize) -> bool {
    offset >= span.offset() && offset < span.offset() + span.len()
}

/// Finds the deepest node whose span contains `offset`.
pub fn find_node_at(document: &Document, offset: usize) -> Option<FoundNode> {
    let mut spans: Vec<Extent> = vec![None; document.nodes.len()];
    collect_spans(document, document.root, &mut spans);
    find_in(document, &spans, document.root, offset)
}

type Extent = Option<(usize, usize)>;

fn merge(a: Extent, b: Extent) -> Extent {
    match (a, b) {
        (Some((start, end)), Some((other_start, other_end))) => {
            Some((start.min(other_start), end.max(other_end)))
        }
        (extent, None) | (None, extent) => extent,
    }
}

/// Fills `spans` with the `(start, end)` extent of every node under `node` in one pass.
fn collect_spans(document: &Document, node: NodeId, spans: &mut [Extent]) -> Extent {
    let mut extent = None;
    for token in &document.node(node).tokens {
        let token = document.token(*token);
        extent = merge(extent, Some((token.offset, token.end())));
    }
    for child in document.children(node) {
        if let Some(name) = document.node(child).key {
            extent = merge(extent, collect_spans(document, name, spans));
        }
        extent = merge(extent, collect_spans(document, child, spans));
    }
    spans[node] = extent;
    extent
}

fn extent_contains(extent: Extent, offset: usize) -> bool {
    matches!(extent, Some((start, end)) if offset >= start && offset < end)
}

fn find_in(document: &Document, spans: &[Extent], node: NodeId, offset: usize) -> Option<FoundNode> {
    if !extent_contains(spans[node], offset) {
        return None;
    }

    for child in document.children(node) {
        if let Some(name) = document.node(child).key {
            let name_token = document.token(document.first_token(name));
            if span_contains(name_token.span(), offset) {
                return Some(FoundNode::PropertyName { name, value: child });
            }
        }
        if let Some(found) = find_in(document, spans, child, offset) {
            return Some(found);
        }
    }

    Some(FoundNode::Value(node))
}

/// The clause a value at `offset` was interpreted as, or its plain JSON type when unmarked.
pub fn type_info_at(document: &Document, offset: usize) -> Option<String> {
    let node = find_node_at(document, offset)?.value();
    match document.resolved_clause(node) {
        Some(clause) => Some(clause.to_string()),
        None => Some(document.value(node).json_type().to_string()),
    }
}

/// Classifies every token of the document for highlighting, ordered by offset.
pub fn semantic_tokens(document: &Document) -> Vec<SemanticToken> {
    let mut tokens = Vec::with_capacity(document.tokens.len());
    for node in &document.nodes {
        for (i, token) in node.tokens.iter().enumerate() {
            let token_type = if i > 0 {
                SemanticTokenType::Punctuation
            } else if node.is_property_name {
                SemanticTokenType::Property
            } else {
                match node.value {
                    Value::Null => SemanticTokenType::Null,
                    Value::Bool(_) => SemanticTokenType::Boolean,
                    Value::Number(_) => SemanticTokenType::Number,
                    Value::String(_) => SemanticTokenType::String,
                    Value::Object(_) => SemanticTokenType::Object,
                    Value::Array(_) => SemanticTokenType::Array,
                }
            };
            let token = document.token(*token);
            if token.length > 0 {
                tokens.push(SemanticToken {
                    span: token.span(),
                    token_type,
                });
            }
        }
    }

    tokens.sort_by_key(|token| token.span.offset());
    tokens
}
