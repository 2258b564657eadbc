use crate::ast::{Diagnostic, Document, JsonType, NodeId};
use crate::clause::Clause;
use crate::error::SchemaError;
use crate::schema::ClauseRegistry;

/// Marks a parsed document against compiled clauses.
///
/// Marking annotates each node with the clause id it was checked against and
/// appends a diagnostic for every mismatch. Schema problems that make
/// marking impossible (an undeclared id, a clause that reaches itself without
/// consuming a value) abort with a `SchemaError` instead.
pub struct Interpreter<'r, 'd> {
    registry: &'r ClauseRegistry,
    document: &'d mut Document,
    in_progress: Vec<(NodeId, &'r str)>,
}

impl<'r, 'd> Interpreter<'r, 'd> {
    pub fn new(registry: &'r ClauseRegistry, document: &'d mut Document) -> Self {
        Self {
            registry,
            document,
            in_progress: Vec::new(),
        }
    }

    /// Marks the document root with the clause registered under `root_type`.
    pub fn run(&mut self, root_type: &str) -> Result<(), SchemaError> {
        let clause = self.registry.get(root_type)?;
        let root = self.document.root;
        self.mark(clause, root)
    }

    pub fn registry(&self) -> &'r ClauseRegistry {
        self.registry
    }

    pub fn document(&self) -> &Document {
        &*self.document
    }

    pub(crate) fn mark(&mut self, clause: &'r Clause, node: NodeId) -> Result<(), SchemaError> {
        let key = (node, clause.id.as_str());
        if self.in_progress.contains(&key) {
            return Err(SchemaError::CircularClause {
                id: clause.id.clone(),
            });
        }

        self.in_progress.push(key);
        let result = clause.mark(self, node);
        self.in_progress.pop();
        result
    }

    pub(crate) fn set_clause(&mut self, node: NodeId, id: &str) {
        self.document.nodes[node].clause = Some(id.to_string());
    }

    /// Records the final annotation of a variant: its own id plus the winning candidate, if any.
    pub(crate) fn resolve(&mut self, node: NodeId, id: &str, delegate: Option<&str>) {
        let node = &mut self.document.nodes[node];
        node.clause = Some(id.to_string());
        node.delegate_clause = delegate.map(str::to_string);
    }

    /// Appends a diagnostic anchored to the node's first token.
    pub(crate) fn accumulate_error(&mut self, node: NodeId, message: impl Into<String>) {
        let token = self.document.first_token(node);
        self.document.diagnostics.push(Diagnostic {
            token,
            message: message.into(),
        });
    }

    /// Returns whether the node holds a value of the expected type, diagnosing it if not.
    pub(crate) fn type_check(&mut self, node: NodeId, expected: JsonType) -> bool {
        let found = self.document.value(node).json_type();
        if found == expected {
            return true;
        }

        self.accumulate_error(
            node,
            format!(
                "Expected {}, but found {} instead.",
                expected.with_article(),
                found.with_article()
            ),
        );
        false
    }

    pub(crate) fn checkpoint(&self) -> usize {
        self.document.diagnostics.len()
    }

    /// Discards diagnostics recorded after `checkpoint` and every annotation in the subtree of `node`.
    pub(crate) fn rollback(&mut self, checkpoint: usize, node: NodeId) {
        self.document.diagnostics.truncate(checkpoint);

        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            let entry = &mut self.document.nodes[current];
            entry.clause = None;
            entry.delegate_clause = None;
            pending.extend(self.document.children(current));
        }
    }
}

/// Marks `document` against the clause registered as `root_type`.
///
/// Mismatches are appended to `document.diagnostics`; the returned error is
/// reserved for a broken schema.
pub fn interpret(
    document: &mut Document,
    registry: &ClauseRegistry,
    root_type: &str,
) -> Result<(), SchemaError> {
    let before = document.diagnostics.len();
    Interpreter::new(registry, document).run(root_type)?;
    log::debug!(
        "interpreted query as \"{root_type}\": {} new diagnostic(s)",
        document.diagnostics.len() - before
    );
    Ok(())
}
