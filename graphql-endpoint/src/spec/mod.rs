//! Parsing, validation and classification of GraphQL documents.
//!
//! The grammar and validation rules belong to `apollo-compiler`; this module
//! only adapts them to the endpoint's error model.

mod operation;

use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::ast;
use apollo_compiler::validation::Valid;

pub use self::operation::OperationKind;
pub use self::operation::classify;
use crate::error::SyntaxError;
use crate::error::ValidationErrors;
use crate::graphql;

/// Source name reported in diagnostics for the request's query.
pub(crate) const QUERY_EXECUTABLE: &str = "GraphQL request";

pub(crate) const ERROR_CODE_PARSE_FAILED: &str = "GRAPHQL_PARSE_FAILED";
pub(crate) const ERROR_CODE_VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";

/// A validated schema, shared by every request.
pub type Schema = Arc<Valid<apollo_compiler::Schema>>;

/// A syntactically valid query document that has not been validated yet.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    ast: ast::Document,
}

impl ParsedDocument {
    pub(crate) fn ast(&self) -> &ast::Document {
        &self.ast
    }
}

/// Parse and validate a schema definition.
pub fn parse_schema(sdl: &str, path: &str) -> Result<Schema, ValidationErrors> {
    apollo_compiler::Schema::parse_and_validate(sdl, path)
        .map(Arc::new)
        .map_err(|with_errors| ValidationErrors {
            errors: graphql::from_diagnostics(&with_errors.errors, ERROR_CODE_VALIDATION_FAILED),
        })
}

/// Parse the query text without looking at any schema.
pub fn parse(query: &str) -> Result<ParsedDocument, SyntaxError> {
    tracing::info_span!("parse_query", "otel.kind" = "INTERNAL").in_scope(|| {
        ast::Document::parse(query, QUERY_EXECUTABLE)
            .map(|ast| ParsedDocument { ast })
            .map_err(|with_errors| SyntaxError {
                errors: graphql::from_diagnostics(&with_errors.errors, ERROR_CODE_PARSE_FAILED),
            })
    })
}

/// Check a parsed document against the schema.
///
/// Errors are reported in document order; an empty list never happens on `Err`.
pub fn validate(
    schema: &Schema,
    document: &ParsedDocument,
) -> Result<Valid<ExecutableDocument>, ValidationErrors> {
    tracing::info_span!("validate_query", "otel.kind" = "INTERNAL").in_scope(|| {
        document
            .ast
            .to_executable_validate(schema.as_ref())
            .map_err(|with_errors| ValidationErrors {
                errors: graphql::from_diagnostics(
                    &with_errors.errors,
                    ERROR_CODE_VALIDATION_FAILED,
                ),
            })
    })
}
