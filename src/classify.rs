//! Works out what kind of operation a request is about to run.

use async_graphql_parser::types::{
    DocumentOperations, ExecutableDocument, OperationDefinition, OperationType,
};

use crate::logging::trace;

/// The operation name GraphiQL style tooling uses for schema introspection.
///
/// Operations with this name are always sent over plain HTTP.
pub const INTROSPECTION_OPERATION_NAME: &str = "IntrospectionQuery";

/// Parses a GraphQL document, returning `None` if it isn't valid.
pub fn parse_document(query: &str) -> Option<ExecutableDocument> {
    match async_graphql_parser::parse_query(query) {
        Ok(document) => Some(document),
        Err(error) => {
            #[allow(unused)]
            let error = error;
            trace!("couldn't parse document, treating as a non-subscription: {error}");
            None
        }
    }
}

/// Returns true if the operation selected by `operation_name` is a subscription.
///
/// With no name the document must contain exactly one operation.  Anything
/// that can't be resolved to a single operation is not a subscription.
pub fn is_subscription(
    document: Option<&ExecutableDocument>,
    operation_name: Option<&str>,
) -> bool {
    document
        .and_then(|document| find_operation(document, operation_name))
        .is_some_and(|operation| operation.ty == OperationType::Subscription)
}

fn find_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Option<&'a OperationDefinition> {
    let operation = match (&document.operations, operation_name) {
        (DocumentOperations::Single(operation), None) => operation,
        (DocumentOperations::Single(_), Some(_)) => return None,
        (DocumentOperations::Multiple(operations), Some(name)) => operations.get(name)?,
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => {
            operations.values().next()?
        }
        (DocumentOperations::Multiple(_), None) => return None,
    };

    Some(&operation.node)
}
