//! Message definitions for the [graphql-transport-ws protocol][1]
//!
//! [1]: https://github.com/enisdenjo/graphql-ws/blob/HEAD/PROTOCOL.md

use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename = "connection_init")]
pub struct ConnectionInit {
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl ConnectionInit {
    pub fn new(payload: Option<Value>) -> Self {
        ConnectionInit { payload }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message<'a, Operation> {
    Subscribe { id: String, payload: &'a Operation },
    Complete { id: String },
    Ping,
    Pong,
}

#[derive(serde::Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Next {
        id: String,
        payload: Value,
    },
    Error {
        id: String,
        payload: Vec<Value>,
    },
    Complete {
        id: String,
    },
    ConnectionAck {
        #[allow(dead_code)]
        payload: Option<Value>,
    },
    Ping {
        #[allow(dead_code)]
        payload: Option<Value>,
    },
    Pong {
        #[allow(dead_code)]
        payload: Option<Value>,
    },
}

impl Event {
    pub fn id(&self) -> Option<&str> {
        match self {
            Event::Next { id, .. } | Event::Complete { id, .. } | Event::Error { id, .. } => {
                Some(id.as_ref())
            }
            Event::Ping { .. } | Event::Pong { .. } | Event::ConnectionAck { .. } => None,
        }
    }

    pub fn r#type(&self) -> &'static str {
        match self {
            Event::Next { .. } => "next",
            Event::Complete { .. } => "complete",
            Event::Error { .. } => "error",
            Event::Ping { .. } => "ping",
            Event::Pong { .. } => "pong",
            Event::ConnectionAck { .. } => "connection_ack",
        }
    }

    /// The payload to hand to a subscription, if this event carries one.
    ///
    /// Protocol level errors are reshaped into a GraphQL response so they can
    /// travel down the same channel as regular results.
    pub fn forwarding_payload(self) -> Option<Value> {
        match self {
            Event::Next { payload, .. } => Some(payload),
            Event::Error { payload, .. } => Some(serde_json::json!({ "errors": payload })),
            _ => None,
        }
    }
}
