//! GraphQL request & response types shared by every transport.
//!
//! [`GraphqlParams`] is what callers hand to a [`crate::Fetcher`], and
//! [`ExecutionResult`] is what comes back, whether that was a single JSON body,
//! one part of a multipart response or one `next` message on a websocket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The parameters of a single GraphQL operation.
///
/// Serializes to the JSON body expected by GraphQL-over-HTTP endpoints and to
/// the `payload` of a graphql-transport-ws `subscribe` message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlParams {
    /// The GraphQL document text
    pub query: String,
    /// The name of the operation in `query` to execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Variables for the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Protocol extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlParams {
    /// Creates params for the given document text
    pub fn new(query: impl Into<String>) -> Self {
        GraphqlParams {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Sets the operation name
    pub fn operation_name(self, name: impl Into<String>) -> Self {
        GraphqlParams {
            operation_name: Some(name.into()),
            ..self
        }
    }

    /// Sets the variables
    pub fn variables(self, variables: Value) -> Self {
        GraphqlParams {
            variables: Some(variables),
            ..self
        }
    }

    /// Sets the extensions
    pub fn extensions(self, extensions: Value) -> Self {
        GraphqlParams {
            extensions: Some(extensions),
            ..self
        }
    }
}

/// A GraphQL execution result, or one increment of one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The data returned by the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Any errors raised while executing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
    /// Response extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    /// Whether more increments will follow this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
    /// Deferred or streamed payloads delivered with this increment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incremental: Vec<ExecutionResult>,
    /// The response path an incremental payload applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// The label of the `@defer` or `@stream` directive that produced this payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Items produced by `@stream`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Value>>,
}

impl ExecutionResult {
    /// True if the server has said no further increments will follow.
    pub fn is_final(&self) -> bool {
        self.has_next == Some(false)
    }
}

/// A GraphQL error as it appears in the `errors` array of a response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// A description of the error
    pub message: String,
    /// Locations in the document the error relates to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    /// The response path the error relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Error extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

/// A line & column in a GraphQL document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[allow(missing_docs)]
    pub line: u32,
    #[allow(missing_docs)]
    pub column: u32,
}

/// An abstraction over GraphQL operations.
///
/// The websocket [`crate::Client`] is generic over this, so users with their
/// own operation types can run them directly on a client.  [`GraphqlParams`]
/// implements it, decoding into an [`ExecutionResult`].
pub trait GraphqlOperation: serde::Serialize {
    /// The actual response & error type of this operation.
    type Response;

    /// The error that will be returned from failed attempts to decode a `Response`.
    type Error: std::error::Error;

    /// Decodes a `GenericResponse` into the actual response that will be returned
    /// to users for this operation.
    fn decode(&self, data: Value) -> Result<Self::Response, Self::Error>;
}

impl GraphqlOperation for GraphqlParams {
    type Response = ExecutionResult;

    type Error = serde_json::Error;

    fn decode(&self, data: Value) -> Result<Self::Response, Self::Error> {
        serde_json::from_value(data)
    }
}
