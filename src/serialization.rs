use crate::ast::{Document, NodeId, Value};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Borrowed serde view of one node of a parsed document and everything below it.
#[derive(Debug, Clone, Copy)]
pub struct ValueView<'a> {
    document: &'a Document,
    node: NodeId,
}

impl<'a> ValueView<'a> {
    pub fn new(document: &'a Document, node: NodeId) -> Self {
        Self { document, node }
    }

    pub fn root(document: &'a Document) -> Self {
        Self::new(document, document.root)
    }

    fn child(&self, node: NodeId) -> Self {
        Self::new(self.document, node)
    }
}

impl Serialize for ValueView<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.document.value(self.node) {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(*n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.child(*item))?;
                }
                seq.end()
            }
            Value::Object(properties) => {
                let mut map = serializer.serialize_map(Some(properties.len()))?;
                for (name, value) in properties {
                    map.serialize_entry(name, &self.child(*value))?;
                }
                map.end()
            }
        }
    }
}

// 2^53: past this an f64 no longer holds every integer exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn serialize_number<S>(n: f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if !n.is_finite() {
        serializer.serialize_unit()
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

/// Converts the subtree under `node` into an owned `serde_json::Value`.
pub(crate) fn to_value(document: &Document, node: NodeId) -> serde_json::Value {
    // Serializing a tree of plain maps, sequences and scalars into serde_json cannot fail.
    serde_json::to_value(ValueView::new(document, node)).unwrap_or(serde_json::Value::Null)
}
