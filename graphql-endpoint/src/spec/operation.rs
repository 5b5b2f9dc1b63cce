use std::fmt::Display;

use apollo_compiler::ast;
use serde::Deserialize;
use serde::Serialize;

use super::ParsedDocument;

/// GraphQL operation type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl OperationKind {
    /// The keyword introducing this kind of operation in a document.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl From<ast::OperationType> for OperationKind {
    fn from(value: ast::OperationType) -> Self {
        match value {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// Find the kind of the operation selected by `operation_name`.
///
/// Without a name (or with a blank one) the document must contain exactly one
/// operation. Returns `None` when no single operation is selected.
pub fn classify(document: &ParsedDocument, operation_name: Option<&str>) -> Option<OperationKind> {
    let mut operations = document.ast().definitions.iter().filter_map(|definition| {
        if let ast::Definition::OperationDefinition(operation) = definition {
            Some(operation)
        } else {
            None
        }
    });

    match operation_name.filter(|name| !name.trim().is_empty()) {
        Some(name) => operations
            .find(|operation| operation.name.as_ref().is_some_and(|n| n.as_str() == name))
            .map(|operation| operation.operation_type.into()),
        None => {
            let operation = operations.next()?;
            if operations.next().is_some() {
                return None;
            }
            Some(operation.operation_type.into())
        }
    }
}
