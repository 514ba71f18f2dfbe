use std::{
    collections::{hash_map::Entry, HashMap},
    future::{pending, IntoFuture},
};

use futures_lite::{future, stream, FutureExt, StreamExt};
use serde_json::Value;

use crate::{
    logging::{trace, warning},
    protocol::Event,
    Error,
};

use super::{
    connection::{Message, ObjectSafeConnection, Reason},
    keepalive::KeepAliveSettings,
    ConnectionCommand,
};

/// The `ConnectionActor` contains the main loop for handling incoming
/// & outgoing messages for a Client.
///
/// This type implements `IntoFuture` and should usually be spawned
/// with an async runtime.
#[must_use]
pub struct ConnectionActor {
    client: Option<async_channel::Receiver<ConnectionCommand>>,
    dropped: async_channel::Receiver<usize>,
    connection: Box<dyn ObjectSafeConnection>,
    operations: HashMap<usize, async_channel::Sender<Result<Value, Error>>>,
    keep_alive: KeepAliveSettings,
    keep_alive_actor: stream::Boxed<ConnectionCommand>,
}

impl ConnectionActor {
    pub(super) fn new(
        connection: Box<dyn ObjectSafeConnection>,
        client: async_channel::Receiver<ConnectionCommand>,
        dropped: async_channel::Receiver<usize>,
        keep_alive: KeepAliveSettings,
    ) -> Self {
        ConnectionActor {
            client: Some(client),
            dropped,
            connection,
            operations: HashMap::new(),
            keep_alive_actor: keep_alive.run().boxed(),
            keep_alive,
        }
    }

    async fn run(mut self) {
        while let Some(next) = self.next().await {
            let response = match next {
                Next::Command(cmd) => self.handle_command(cmd),
                Next::Message(message) => self.handle_message(message),
                Next::Shutdown(reason) => Some(Message::close(reason)),
            };

            let Some(response) = response else { continue };

            if matches!(response, Message::Close { .. }) {
                self.connection.send(response).await.ok();
                return;
            }

            if let Err(error) = self.connection.send(response).await {
                #[allow(unused)]
                let error = error;
                warning!("couldn't send message, shutting down connection: {error}");
                return;
            }
        }
    }

    fn handle_command(&mut self, cmd: ConnectionCommand) -> Option<Message> {
        match cmd {
            ConnectionCommand::Subscribe {
                request,
                sender,
                id,
            } => {
                if let Entry::Vacant(entry) = self.operations.entry(id) {
                    entry.insert(sender);
                    return Some(Message::Text(request));
                }
                warning!("subscription id {id} is already in use");
                None
            }
            ConnectionCommand::Ping => Message::graphql_ping().ok(),
            ConnectionCommand::Cancel(id) => self.cancel(id),
            ConnectionCommand::Close(code, reason) => Some(Message::Close {
                code: Some(code),
                reason: Some(reason),
            }),
        }
    }

    fn cancel(&mut self, id: usize) -> Option<Message> {
        self.operations.remove(&id)?;
        trace!("stopping subscription {id}");
        Message::complete(id).ok()
    }

    fn handle_message(&mut self, message: Message) -> Option<Message> {
        let event = match message.deserialize::<Event>() {
            Ok(event) => event,
            Err(error) => {
                #[allow(unused)]
                let error = error;
                warning!("could not decode incoming message, closing connection: {error}");
                return Some(Message::close(Reason::InvalidMessage));
            }
        };

        match event {
            event @ (Event::Next { .. } | Event::Error { .. }) => {
                let Some(id) = event.id().and_then(|id| id.parse::<usize>().ok()) else {
                    return Some(Message::close(Reason::InvalidMessage));
                };

                let is_error = matches!(event, Event::Error { .. });

                let Some(sender) = self.operations.get(&id) else {
                    // Probably a message that crossed with our complete
                    trace!("received {} for unknown subscription {id}", event.r#type());
                    return None;
                };

                let payload = event.forwarding_payload()?;

                // Subscription channels are unbounded, so this only fails once
                // the subscription has been dropped
                if sender.try_send(Ok(payload)).is_err() {
                    return self.cancel(id);
                }

                if is_error {
                    // error messages terminate an operation
                    self.operations.remove(&id);
                }

                None
            }
            Event::Complete { id } => {
                trace!("subscription {id} complete");
                if let Ok(id) = id.parse::<usize>() {
                    self.operations.remove(&id);
                }
                None
            }
            Event::ConnectionAck { .. } => Some(Message::close(Reason::UnexpectedAck)),
            Event::Ping { .. } => Message::graphql_pong().ok(),
            Event::Pong { .. } => None,
        }
    }

    async fn next(&mut self) -> Option<Next> {
        loop {
            if self.client.is_none() && self.operations.is_empty() {
                // Nothing can use this connection any more
                trace!("client dropped and no subscriptions running, closing connection");
                return Some(Next::Shutdown(Reason::ClientShutdown));
            }

            let selected = {
                let Self {
                    client,
                    dropped,
                    connection,
                    keep_alive_actor,
                    ..
                } = self;

                let command = async {
                    match client {
                        Some(client) => Select::Command(client.recv().await.ok()),
                        None => pending().await,
                    }
                };
                let dropped_id = async {
                    match dropped.recv().await {
                        Ok(id) => Select::Dropped(id),
                        Err(_) => pending().await,
                    }
                };
                let message = async { Select::Message(connection.receive().await) };
                let keep_alive = async { Select::KeepAlive(keep_alive_actor.next().await) };

                command.or(dropped_id).or(message).or(keep_alive).await
            };

            match selected {
                Select::Command(Some(command)) => return Some(Next::Command(command)),
                Select::Command(None) => {
                    self.client.take();
                }
                Select::Dropped(id) => return Some(Next::Command(ConnectionCommand::Cancel(id))),
                Select::Message(Some(Message::Close { code, reason })) => {
                    let code = code.unwrap_or_default();
                    let reason = reason.unwrap_or_default();
                    trace!("connection closed by server: {code} {reason}");
                    self.fail_operations(code, &reason);
                    return None;
                }
                Select::Message(Some(Message::Ping | Message::Pong)) => {
                    self.keep_alive_actor = self.keep_alive.run().boxed();
                }
                Select::Message(Some(message)) => {
                    self.keep_alive_actor = self.keep_alive.run().boxed();
                    return Some(Next::Message(message));
                }
                Select::Message(None) => {
                    trace!("connection dropped");
                    return None;
                }
                Select::KeepAlive(Some(command)) => return Some(Next::Command(command)),
                Select::KeepAlive(None) => {
                    warning!("keep alive failed, closing connection");
                    return Some(Next::Shutdown(Reason::KeepAliveFailure));
                }
            }
        }
    }

    fn fail_operations(&mut self, code: u16, reason: &str) {
        for (_, sender) in self.operations.drain() {
            sender
                .try_send(Err(Error::Close(code, reason.to_owned())))
                .ok();
        }
    }
}

enum Select {
    Command(Option<ConnectionCommand>),
    Dropped(usize),
    Message(Option<Message>),
    KeepAlive(Option<ConnectionCommand>),
}

enum Next {
    Command(ConnectionCommand),
    Message(Message),
    Shutdown(Reason),
}

impl IntoFuture for ConnectionActor {
    type Output = ();

    type IntoFuture = future::Boxed<()>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}
