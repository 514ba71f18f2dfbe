//! A graphql-transport-ws client.
//!
//! This is the websocket collaborator used by the fetcher's subscription
//! transports, but it can be used on its own: build a [`Client`] from any
//! [`Connection`], spawn the returned [`ConnectionActor`] and call
//! [`Client::subscribe`] as many times as needed.  All subscriptions share the
//! one connection and are told apart by their id.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures_lite::StreamExt;
use serde_json::Value;

use crate::{
    graphql::GraphqlOperation,
    logging::trace,
    protocol,
    Error,
};

mod actor;
mod builder;
mod connection;
mod keepalive;
mod subscription;

pub use self::{
    actor::ConnectionActor,
    builder::ClientBuilder,
    connection::{Connection, Message},
    subscription::Subscription,
};

/// A GraphQL over Websocket client
///
/// Cloning a `Client` is cheap: every clone talks to the same connection.
#[derive(Clone)]
pub struct Client {
    actor: async_channel::Sender<ConnectionCommand>,
    drop_sender: async_channel::Sender<usize>,
    next_id: Arc<AtomicUsize>,
}

impl Client {
    pub(super) fn new_internal(
        actor: async_channel::Sender<ConnectionCommand>,
        drop_sender: async_channel::Sender<usize>,
    ) -> Self {
        Client {
            actor,
            drop_sender,
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Starts a subscription on this client.
    ///
    /// Returns a `Stream` of responses.  Responses queue up in the
    /// subscription until they are read, so a subscription that isn't being
    /// polled never holds up the others on the connection.
    pub async fn subscribe<Operation>(
        &self,
        op: Operation,
    ) -> Result<Subscription<Operation>, Error>
    where
        Operation: GraphqlOperation + Unpin + Send + 'static,
        Operation::Response: Send,
    {
        let (sender, receiver) = async_channel::unbounded();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let message = protocol::Message::Subscribe {
            id: id.to_string(),
            payload: &op,
        };

        let request = serde_json::to_string(&message)
            .map_err(|error| Error::Serializing(error.to_string()))?;

        trace!("starting subscription {id}");

        self.actor
            .send(ConnectionCommand::Subscribe {
                request,
                sender,
                id,
            })
            .await
            .map_err(|error| Error::Send(error.to_string()))?;

        Ok(Subscription {
            id,
            stream: Some(
                receiver
                    .map(move |response| {
                        op.decode(response?)
                            .map_err(|error| Error::Decode(error.to_string()))
                    })
                    .boxed(),
            ),
            drop_sender: Some(self.drop_sender.clone()),
        })
    }

    /// Stops the subscription with the given id.
    ///
    /// Dropping a [`Subscription`] does the same thing.
    pub async fn stop(&self, subscription_id: usize) -> Result<(), Error> {
        self.actor
            .send(ConnectionCommand::Cancel(subscription_id))
            .await
            .map_err(|error| Error::Send(error.to_string()))
    }

    /// Gracefully closes the connection
    ///
    /// This will stop all running subscriptions and shut down the ConnectionActor wherever
    /// it is running.
    pub async fn close(self, code: u16, description: impl Into<String>) {
        self.actor
            .send(ConnectionCommand::Close(code, description.into()))
            .await
            .ok();
    }

    /// True once the connection actor for this client has shut down.
    pub fn is_closed(&self) -> bool {
        self.actor.is_closed()
    }
}

pub(super) enum ConnectionCommand {
    Subscribe {
        /// The full subscribe request as a JSON encoded string.
        request: String,
        sender: async_channel::Sender<Result<Value, Error>>,
        id: usize,
    },
    Ping,
    Cancel(usize),
    Close(u16, String),
}
