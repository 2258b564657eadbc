pub mod api;
pub mod ast;
pub mod clause;
pub mod error;
pub mod interpreter;
#[cfg(feature = "lsp")]
pub mod lsp;
pub mod parser;
pub mod scanner;
pub mod schema;
pub mod serialization;

pub use api::{analyze, Analysis};
pub use ast::{Diagnostic, Document, Token, Value, ValueNode};
pub use error::{ConfigError, EqlError, QueryReport, SchemaError};
pub use parser::parse;
pub use schema::ClauseRegistry;
