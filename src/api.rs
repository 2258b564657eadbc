use crate::ast::{Diagnostic, Document, NodeId};
use crate::error::{EqlError, QueryReport};
use crate::interpreter::interpret;
#[cfg(feature = "lsp")]
use crate::lsp::{self, FoundNode, SemanticToken};
use crate::parser::parse;
use crate::schema::ClauseRegistry;
use crate::serialization::{to_value, ValueView};
use miette::{GraphicalReportHandler, GraphicalTheme};
#[cfg(feature = "lsp")]
use miette::SourceSpan;
use serde::{Serialize, Serializer};

/// The result of parsing and interpreting one query.
///
/// Holds the marked document, whose diagnostics list combines parse and
/// interpretation problems in the order they were found.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub document: Document,
    pub name: String,
}

impl Serialize for Analysis {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ValueView::root(&self.document).serialize(serializer)
    }
}

impl Analysis {
    /// True when neither the parser nor the interpreter reported anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.document.has_errors()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.document.diagnostics
    }

    /// Converts the parsed query into a `serde_json::Value`.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        to_value(&self.document, self.document.root)
    }

    /// Serializes the parsed query into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the parsed query into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }

    /// The concrete type id a node was interpreted as; for variants, the chosen candidate.
    #[must_use]
    pub fn resolved_type(&self, node: NodeId) -> Option<&str> {
        self.document.resolved_clause(node)
    }

    #[must_use]
    pub fn report(&self) -> Option<QueryReport> {
        QueryReport::from_document(&self.name, &self.document)
    }

    /// Renders every diagnostic against the query text, without colors. Empty when valid.
    #[must_use]
    pub fn render_report(&self) -> String {
        let Some(report) = self.report() else {
            return String::new();
        };

        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        let mut buffer = String::new();
        if handler.render_report(&mut buffer, &report).is_err() {
            log::debug!("failed to render report for {}", self.name);
        }
        buffer
    }

    #[cfg(feature = "lsp")]
    /// Finds the node under the given byte offset.
    #[must_use]
    pub fn find_node_at(&self, offset: usize) -> Option<FoundNode> {
        lsp::find_node_at(&self.document, offset)
    }

    #[cfg(feature = "lsp")]
    /// The span of the value under the given byte offset, including its children.
    /// Used for selection ranges and hover highlights.
    #[must_use]
    pub fn span_at(&self, offset: usize) -> Option<SourceSpan> {
        let found = self.find_node_at(offset)?;
        Some(lsp::node_span(&self.document, found.value()))
    }

    #[cfg(feature = "lsp")]
    /// Gets the interpreted type of the value at the given byte offset.
    /// This is the core of "hover" tooltips.
    #[must_use]
    pub fn type_info_at(&self, offset: usize) -> Option<String> {
        lsp::type_info_at(&self.document, offset)
    }

    #[cfg(feature = "lsp")]
    #[must_use]
    pub fn semantic_tokens(&self) -> Vec<SemanticToken> {
        lsp::semantic_tokens(&self.document)
    }
}

/// Parses `source` and interprets it against the clause registered as `root_type`.
///
/// This is the primary entry point. Malformed or mistyped queries still
/// produce an `Analysis`; check [`Analysis::is_valid`] and
/// [`Analysis::diagnostics`] for the problems found.
///
/// # Arguments
///
/// * `source` - The query text.
/// * `name` - A display name for the query, used in rendered reports.
/// * `registry` - The compiled type configuration.
/// * `root_type` - The type id the query's root value must satisfy.
///
/// # Errors
///
/// Returns an `EqlError` only when the schema itself is broken, e.g. the
/// root type or a referenced type is not declared.
pub fn analyze(
    source: &str,
    name: &str,
    registry: &ClauseRegistry,
    root_type: &str,
) -> Result<Analysis, EqlError> {
    let mut document = parse(source);
    interpret(&mut document, registry, root_type)?;

    Ok(Analysis {
        document,
        name: name.to_string(),
    })
}
