use crate::clause::{Clause, ClauseKind, Structure};
use crate::error::{ConfigError, EqlError, SchemaError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::Path;

/// Plain identifiers, `name[]` arrays, and `{key:value}` maps.
static TYPE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Za-z_][A-Za-z0-9_]*(?:\[\])?|\{[A-Za-z_][A-Za-z0-9_]*:[A-Za-z_][A-Za-z0-9_]*\})$",
    )
    .expect("type name pattern is valid")
});

/// Clause ids that exist in every registry.
pub const BUILTIN_TYPES: [&str; 5] = ["null", "boolean", "number", "string", "base"];

/// The recognized keys of one entry in a type configuration.
///
/// Unrecognized keys are ignored here but kept on the compiled clause's `settings`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypeSettings {
    #[serde(rename = "type")]
    pub kind: Option<JsonValue>,
    pub name: Option<String>,
    pub desc: Option<String>,
    pub values: Vec<JsonValue>,
    pub required: Vec<String>,
    pub strict: bool,
}

/// Every compiled clause, keyed by type id. Immutable once built and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ClauseRegistry {
    clauses: HashMap<String, Clause>,
}

impl ClauseRegistry {
    pub fn compile(config: &Map<String, JsonValue>) -> Result<Self, SchemaError> {
        SchemaCompiler::new(config).compile()
    }

    pub fn from_json_str(text: &str) -> Result<Self, EqlError> {
        let config: Map<String, JsonValue> =
            serde_json::from_str(text).map_err(ConfigError::from)?;
        Ok(Self::compile(&config)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, EqlError> {
        let config: Map<String, JsonValue> =
            serde_yaml::from_str(text).map_err(ConfigError::from)?;
        Ok(Self::compile(&config)?)
    }

    /// Loads a configuration file; `.yaml` and `.yml` files are read as YAML, anything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EqlError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loading type configuration from {}", path.display());

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }

    pub fn try_get(&self, id: &str) -> Option<&Clause> {
        self.clauses.get(id)
    }

    pub fn get(&self, id: &str) -> Result<&Clause, SchemaError> {
        self.clauses
            .get(id)
            .ok_or_else(|| SchemaError::UnknownClause { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clauses.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.clauses.keys().map(String::as_str)
    }
}

/// Compiles a type configuration (type id to settings object) into a registry.
pub fn compile(config: &Map<String, JsonValue>) -> Result<ClauseRegistry, SchemaError> {
    ClauseRegistry::compile(config)
}

/// Checks a type id against the accepted name forms.
pub fn validate_type_name(name: &str) -> Result<(), SchemaError> {
    if TYPE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidTypeName {
            name: name.to_string(),
        })
    }
}

/// For `x[]` and `{k:v}` ids, the collection clause plus the id its items are marked with.
fn collection_kind(id: &str) -> Option<(ClauseKind, String)> {
    if let Some(element) = id.strip_suffix("[]") {
        return Some((
            ClauseKind::Array {
                element: element.to_string(),
            },
            element.to_string(),
        ));
    }

    let (key, value) = id.strip_prefix('{')?.strip_suffix('}')?.split_once(':')?;
    Some((
        ClauseKind::Map {
            key: key.to_string(),
            value: value.to_string(),
        },
        value.to_string(),
    ))
}

struct SchemaCompiler<'c> {
    config: &'c Map<String, JsonValue>,
    clauses: HashMap<String, Clause>,
}

impl<'c> SchemaCompiler<'c> {
    fn new(config: &'c Map<String, JsonValue>) -> Self {
        let mut clauses = HashMap::new();
        for id in BUILTIN_TYPES {
            let kind = match id {
                "null" => ClauseKind::Null,
                "boolean" => ClauseKind::Boolean,
                "number" => ClauseKind::Number,
                "string" => ClauseKind::String,
                _ => ClauseKind::Base,
            };
            clauses.insert(id.to_string(), Clause::synthesized(id, kind));
        }
        Self { config, clauses }
    }

    fn compile(mut self) -> Result<ClauseRegistry, SchemaError> {
        let config = self.config;
        for (id, settings) in config {
            self.define(id, settings)?;
        }
        log::debug!(
            "compiled {} clause(s) from {} declared type(s)",
            self.clauses.len(),
            config.len()
        );
        Ok(ClauseRegistry {
            clauses: self.clauses,
        })
    }

    fn define(&mut self, id: &str, raw: &JsonValue) -> Result<(), SchemaError> {
        validate_type_name(id)?;
        let settings =
            TypeSettings::deserialize(raw).map_err(|source| SchemaError::InvalidSettings {
                id: id.to_string(),
                source,
            })?;

        let kind = match &settings.kind {
            Some(JsonValue::String(kind)) => self.named_kind(id, kind, &settings)?,
            Some(JsonValue::Array(candidates)) => self.variant_kind(id, candidates)?,
            Some(JsonValue::Object(properties)) => self.structure_kind(id, properties, &settings)?,
            Some(other) => {
                return Err(SchemaError::UnknownClauseKind {
                    id: id.to_string(),
                    kind: other.to_string(),
                })
            }
            None => {
                return Err(SchemaError::UnknownClauseKind {
                    id: id.to_string(),
                    kind: "<missing>".to_string(),
                })
            }
        };

        log::debug!("defined clause \"{id}\"");
        self.clauses
            .insert(id.to_string(), Clause::new(id, kind, &settings, raw.clone()));
        Ok(())
    }

    fn named_kind(
        &mut self,
        id: &str,
        kind: &str,
        settings: &TypeSettings,
    ) -> Result<ClauseKind, SchemaError> {
        Ok(match kind {
            "null" => ClauseKind::Null,
            "boolean" => ClauseKind::Boolean,
            "number" => ClauseKind::Number,
            "string" => ClauseKind::String,
            "base" => ClauseKind::Base,
            "enum" => ClauseKind::Enum {
                values: settings.values.clone(),
            },
            _ => {
                validate_type_name(kind)?;
                if let Some((collection, item)) = collection_kind(kind) {
                    self.declare(&item)?;
                    collection
                } else if self.config.contains_key(kind) {
                    ClauseKind::Reference {
                        target: kind.to_string(),
                    }
                } else {
                    return Err(SchemaError::UnknownClauseKind {
                        id: id.to_string(),
                        kind: kind.to_string(),
                    });
                }
            }
        })
    }

    fn variant_kind(&mut self, id: &str, candidates: &[JsonValue]) -> Result<ClauseKind, SchemaError> {
        let mut ids = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let JsonValue::String(candidate) = candidate else {
                return Err(SchemaError::UnknownClauseKind {
                    id: id.to_string(),
                    kind: candidate.to_string(),
                });
            };
            self.declare(candidate)?;
            ids.push(candidate.clone());
        }
        Ok(ClauseKind::Variant { candidates: ids })
    }

    fn structure_kind(
        &mut self,
        id: &str,
        properties: &Map<String, JsonValue>,
        settings: &TypeSettings,
    ) -> Result<ClauseKind, SchemaError> {
        let mut structure = Structure {
            properties: IndexMap::with_capacity(properties.len()),
            required: settings.required.clone(),
            strict: settings.strict,
        };

        for (name, child) in properties {
            // A null child type names a type declared under the property's own name.
            let type_id = match child {
                JsonValue::String(type_id) => type_id.clone(),
                JsonValue::Null => name.clone(),
                other => {
                    return Err(SchemaError::UnknownClauseKind {
                        id: format!("{id}.{name}"),
                        kind: other.to_string(),
                    })
                }
            };
            self.declare(&type_id)?;
            structure.properties.insert(name.clone(), type_id);
        }
        Ok(ClauseKind::Structure(structure))
    }

    /// Validates a referenced id and synthesizes its clause if it is an `x[]` or `{k:v}` form.
    ///
    /// Plain ids are left for `define` (or for an unknown-clause error at marking time).
    fn declare(&mut self, id: &str) -> Result<(), SchemaError> {
        if self.clauses.contains_key(id) {
            return Ok(());
        }
        validate_type_name(id)?;

        if let Some((kind, item)) = collection_kind(id) {
            log::debug!("synthesized clause \"{id}\"");
            self.clauses
                .insert(id.to_string(), Clause::synthesized(id, kind));
            self.declare(&item)?;
        }
        Ok(())
    }
}
