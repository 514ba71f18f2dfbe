use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::Error;

/// Abstraction around a websocket connection.
///
/// A built in implementation is provided for `async_tungstenite` behind the
/// `tungstenite` feature.
///
/// If users wish to add support for a new websocket library they should
/// implement this trait.
pub trait Connection {
    /// Receive the next message on this connection.
    fn receive(&mut self) -> impl Future<Output = Option<Message>> + Send;

    /// Send a message with on connection
    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), Error>> + Send;
}

/// A websocket message
///
/// Websocket client libraries usually provide their own version of this struct.
/// The [Connection] trait for a given client should handle translation to & from this enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// A message containing the given text payload
    Text(String),
    /// A message that closes the connection with the given code & reason
    Close {
        /// The status code for this close message
        code: Option<u16>,
        /// Some text explaining the reason the connection is being closed
        reason: Option<String>,
    },
    /// A ping
    Ping,
    /// A reply to a ping
    Pong,
}

impl Message {
    pub(crate) fn deserialize<T>(self) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let Message::Text(text) = self else {
            return Err(Error::Decode("expected a text message".into()));
        };

        serde_json::from_str(&text).map_err(|error| Error::Decode(error.to_string()))
    }

    pub(crate) fn init(payload: Option<Value>) -> Result<Self, Error> {
        json_message(&crate::protocol::ConnectionInit::new(payload))
    }

    pub(crate) fn graphql_ping() -> Result<Self, Error> {
        json_message(&crate::protocol::Message::Ping::<()>)
    }

    pub(crate) fn graphql_pong() -> Result<Self, Error> {
        json_message(&crate::protocol::Message::Pong::<()>)
    }

    pub(crate) fn complete(id: usize) -> Result<Self, Error> {
        json_message(&crate::protocol::Message::Complete::<()> { id: id.to_string() })
    }

    pub(crate) fn close(reason: Reason) -> Self {
        match reason {
            Reason::UnexpectedAck => Message::Close {
                code: Some(4855),
                reason: Some("too many acknowledges".into()),
            },
            Reason::InvalidMessage => Message::Close {
                code: Some(4400),
                reason: Some("invalid message received".into()),
            },
            Reason::KeepAliveFailure => Message::Close {
                code: Some(4503),
                reason: Some("service unavailable. keep alive failure".into()),
            },
            Reason::UnexpectedHandshake => Message::Close {
                code: Some(4950),
                reason: Some("unexpected message while waiting for ack".into()),
            },
            Reason::ClientShutdown => Message::Close {
                code: Some(1000),
                reason: Some("client shutting down".into()),
            },
        }
    }
}

pub(crate) enum Reason {
    UnexpectedAck,
    InvalidMessage,
    KeepAliveFailure,
    UnexpectedHandshake,
    ClientShutdown,
}

fn json_message(payload: &impl serde::Serialize) -> Result<Message, Error> {
    Ok(Message::Text(
        serde_json::to_string(payload).map_err(|error| Error::Serializing(error.to_string()))?,
    ))
}

/// An object safe wrapper around the Connection trait, allowing us
/// to use it dynamically
pub(crate) trait ObjectSafeConnection: Send {
    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Option<Message>> + Send + '_>>;

    fn send(
        &mut self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>>;
}

impl<T: Connection + Sized + Send> ObjectSafeConnection for T {
    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Option<Message>> + Send + '_>> {
        Box::pin(Connection::receive(self))
    }

    fn send(
        &mut self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
        Box::pin(Connection::send(self, message))
    }
}
