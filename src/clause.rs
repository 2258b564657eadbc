use crate::ast::{JsonType, NodeId, Value};
use crate::error::SchemaError;
use crate::interpreter::Interpreter;
use crate::schema::TypeSettings;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// A compiled validator for one declared type name.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub id: String,
    /// Human readable name; defaults to the id with underscores turned into spaces.
    pub name: String,
    pub desc: String,
    /// The raw settings object the clause was compiled from, including keys this crate ignores.
    pub settings: JsonValue,
    pub kind: ClauseKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    Null,
    Boolean,
    Number,
    String,
    /// Accepts any value.
    Base,
    Enum { values: Vec<JsonValue> },
    Array { element: String },
    /// Keys are unconstrained; every property value is marked against `value`.
    Map { key: String, value: String },
    Reference { target: String },
    Structure(Structure),
    /// Candidates are tried in order; the first that marks cleanly wins.
    Variant { candidates: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    /// Property name to type id, in declaration order.
    pub properties: IndexMap<String, String>,
    pub required: Vec<String>,
    /// Diagnose properties that are not declared.
    pub strict: bool,
}

impl Clause {
    pub(crate) fn new(id: &str, kind: ClauseKind, settings: &TypeSettings, raw: JsonValue) -> Self {
        Self {
            id: id.to_string(),
            name: settings
                .name
                .clone()
                .unwrap_or_else(|| id.replace('_', " ")),
            desc: settings.desc.clone().unwrap_or_default(),
            settings: raw,
            kind,
        }
    }

    /// A clause the compiler created on its own (built-in scalars, `x[]` and `{k:v}` forms).
    pub(crate) fn synthesized(id: &str, kind: ClauseKind) -> Self {
        Self::new(
            id,
            kind,
            &TypeSettings::default(),
            JsonValue::Object(serde_json::Map::new()),
        )
    }

    /// Checks `node` against this clause, recursing into children, recording mismatches
    /// as diagnostics. Only unresolvable clause ids fail outright.
    pub(crate) fn mark<'r>(
        &'r self,
        interpreter: &mut Interpreter<'r, '_>,
        node: NodeId,
    ) -> Result<(), SchemaError> {
        match &self.kind {
            ClauseKind::Null => self.mark_scalar(interpreter, node, JsonType::Null),
            ClauseKind::Boolean => self.mark_scalar(interpreter, node, JsonType::Boolean),
            ClauseKind::Number => self.mark_scalar(interpreter, node, JsonType::Number),
            ClauseKind::String => self.mark_scalar(interpreter, node, JsonType::String),
            ClauseKind::Base => {
                interpreter.set_clause(node, &self.id);
                Ok(())
            }
            ClauseKind::Enum { values } => self.mark_enum(interpreter, node, values),
            ClauseKind::Array { element } => self.mark_array(interpreter, node, element),
            ClauseKind::Map { value, .. } => self.mark_map(interpreter, node, value),
            ClauseKind::Reference { target } => {
                let target = interpreter.registry().get(target)?;
                interpreter.mark(target, node)
            }
            ClauseKind::Structure(structure) => self.mark_structure(interpreter, node, structure),
            ClauseKind::Variant { candidates } => self.mark_variant(interpreter, node, candidates),
        }
    }

    fn mark_scalar(
        &self,
        interpreter: &mut Interpreter<'_, '_>,
        node: NodeId,
        expected: JsonType,
    ) -> Result<(), SchemaError> {
        interpreter.set_clause(node, &self.id);
        interpreter.type_check(node, expected);
        Ok(())
    }

    fn mark_enum(
        &self,
        interpreter: &mut Interpreter<'_, '_>,
        node: NodeId,
        values: &[JsonValue],
    ) -> Result<(), SchemaError> {
        interpreter.set_clause(node, &self.id);

        let found = match interpreter.document().value(node) {
            Value::String(text) => {
                if values.iter().any(|v| v.as_str() == Some(text.as_str())) {
                    return Ok(());
                }
                JsonValue::String(text.clone()).to_string()
            }
            Value::Number(number) => {
                if values.iter().any(|v| v.as_f64() == Some(*number)) {
                    return Ok(());
                }
                number.to_string()
            }
            other => other.json_type().with_article(),
        };

        let allowed: Vec<String> = values.iter().map(JsonValue::to_string).collect();
        interpreter.accumulate_error(
            node,
            format!(
                "Expected one of [{}], but found {found} instead.",
                allowed.join(", ")
            ),
        );
        Ok(())
    }

    fn mark_array<'r>(
        &'r self,
        interpreter: &mut Interpreter<'r, '_>,
        node: NodeId,
        element: &str,
    ) -> Result<(), SchemaError> {
        interpreter.set_clause(node, &self.id);
        if !interpreter.type_check(node, JsonType::Array) {
            return Ok(());
        }

        let element = interpreter.registry().get(element)?;
        for child in interpreter.document().children(node) {
            interpreter.mark(element, child)?;
        }
        Ok(())
    }

    fn mark_map<'r>(
        &'r self,
        interpreter: &mut Interpreter<'r, '_>,
        node: NodeId,
        value: &str,
    ) -> Result<(), SchemaError> {
        interpreter.set_clause(node, &self.id);
        if !interpreter.type_check(node, JsonType::Object) {
            return Ok(());
        }

        let value = interpreter.registry().get(value)?;
        for child in interpreter.document().children(node) {
            interpreter.mark(value, child)?;
        }
        Ok(())
    }

    fn mark_structure<'r>(
        &'r self,
        interpreter: &mut Interpreter<'r, '_>,
        node: NodeId,
        structure: &'r Structure,
    ) -> Result<(), SchemaError> {
        interpreter.set_clause(node, &self.id);

        let present: Vec<(String, NodeId)> = match interpreter.document().value(node) {
            Value::Object(properties) => properties
                .iter()
                .map(|(name, child)| (name.clone(), *child))
                .collect(),
            other => {
                let message = format!(
                    "Clause must be an object, but found {} instead.",
                    other.json_type().with_article()
                );
                interpreter.accumulate_error(node, message);
                return Ok(());
            }
        };

        for (name, child) in &present {
            match structure.properties.get(name) {
                Some(type_id) => {
                    let clause = interpreter.registry().get(type_id)?;
                    interpreter.mark(clause, *child)?;
                }
                None if structure.strict => {
                    let anchor = interpreter.document().node(*child).key.unwrap_or(*child);
                    interpreter.accumulate_error(anchor, format!("Unknown property \"{name}\"."));
                }
                None => {}
            }
        }

        for name in &structure.required {
            if !present.iter().any(|(present_name, _)| present_name == name) {
                interpreter.accumulate_error(node, format!("Missing required property \"{name}\""));
            }
        }
        Ok(())
    }

    fn mark_variant<'r>(
        &'r self,
        interpreter: &mut Interpreter<'r, '_>,
        node: NodeId,
        candidates: &'r [String],
    ) -> Result<(), SchemaError> {
        for candidate in candidates {
            let clause = interpreter.registry().get(candidate)?;
            let checkpoint = interpreter.checkpoint();
            log::trace!("variant \"{}\" trying \"{candidate}\" on node {node}", self.id);

            if let Err(err) = interpreter.mark(clause, node) {
                interpreter.rollback(checkpoint, node);
                return Err(err);
            }
            if interpreter.checkpoint() == checkpoint {
                log::trace!("variant \"{}\" resolved to \"{candidate}\"", self.id);
                interpreter.resolve(node, &self.id, Some(candidate.as_str()));
                return Ok(());
            }

            log::trace!(
                "variant \"{}\" rejected \"{candidate}\", rolling back {} diagnostic(s)",
                self.id,
                interpreter.checkpoint() - checkpoint
            );
            interpreter.rollback(checkpoint, node);
        }

        interpreter.resolve(node, &self.id, None);
        interpreter.accumulate_error(
            node,
            format!(
                "Value does not match any of the accepted types: {}",
                candidates.join(", ")
            ),
        );
        Ok(())
    }
}
