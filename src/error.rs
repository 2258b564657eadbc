use crate::ast::Document;
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum EqlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Hard failures raised while compiling a type configuration or resolving clause ids.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    #[error("Type \"{name}\" is an invalid type name")]
    #[diagnostic(
        code(schema::invalid_type_name),
        help("Type names must be composed only of letters, numbers, and underscores, must not start with a number, and may end in `[]` (array) or take the form `{{key:value}}` (map).")
    )]
    InvalidTypeName { name: String },

    #[error("Unknown clause type \"{kind}\" for type \"{id}\"")]
    #[diagnostic(
        code(schema::unknown_clause_kind),
        help("`type` must be a scalar keyword (null, boolean, number, string, base), `enum`, a declared type name, an array of type names, or an object of property types.")
    )]
    UnknownClauseKind { id: String, kind: String },

    #[error("Unknown clause id \"{id}\"")]
    #[diagnostic(
        code(schema::unknown_clause),
        help("The type is referenced by the schema but never declared in the type configuration.")
    )]
    UnknownClause { id: String },

    #[error("Clause \"{id}\" refers back to itself without consuming any value")]
    #[diagnostic(
        code(schema::circular_clause),
        help("Reference and variant types must eventually reach a concrete clause.")
    )]
    CircularClause { id: String },

    #[error("Invalid settings for type \"{id}\"")]
    #[diagnostic(code(schema::invalid_settings))]
    InvalidSettings {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while loading a type configuration document.
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Could not read type configuration \"{}\"", .path.display())]
    #[diagnostic(code(config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Type configuration is not valid JSON")]
    #[diagnostic(code(config::json))]
    Json(#[from] serde_json::Error),

    #[error("Type configuration is not valid YAML")]
    #[diagnostic(code(config::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

/// Every diagnostic of one query, rendered as a single report over the query text.
#[derive(Error, Debug)]
#[error("Query has {} problem(s)", .labels.len())]
pub struct QueryReport {
    pub(crate) src: NamedSource<String>,
    pub(crate) labels: Vec<LabeledSpan>,
}

impl QueryReport {
    /// Builds a report over `document`'s source, or `None` when it has no diagnostics.
    pub fn from_document(name: &str, document: &Document) -> Option<Self> {
        if document.diagnostics.is_empty() {
            return None;
        }

        let labels = document
            .diagnostics
            .iter()
            .map(|diagnostic| {
                let span = document
                    .tokens
                    .get(diagnostic.token)
                    .map(|token| token.span())
                    .unwrap_or_else(|| (document.source.len(), 0).into());
                LabeledSpan::new_with_span(Some(diagnostic.message.clone()), span)
            })
            .collect();

        Some(Self {
            src: NamedSource::new(name, document.source.clone()),
            labels,
        })
    }

    pub fn spans(&self) -> &[LabeledSpan] {
        &self.labels
    }
}

impl Diagnostic for QueryReport {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("eql::query"))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(self.labels.iter().cloned()))
    }
}
