use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::{logging::trace, protocol::Event, Error};

use super::{
    actor::ConnectionActor,
    connection::{Connection, Message, ObjectSafeConnection, Reason},
    keepalive::KeepAliveSettings,
    Client,
};

/// Settings for the graphql-transport-ws handshake and the connection that
/// follows it.
///
/// The fetcher fills one of these in from its `ws_connection_params` and
/// `ws_keep_alive` options and hands it to its [`crate::Connector`].  It can
/// also be used directly:
///
/// ```rust,no_run
/// use graphql_fetcher::{Client, Connection};
/// #
/// # async fn example(connection: impl Connection + Send + 'static) -> Result<(), graphql_fetcher::Error> {
/// let (client, actor) = Client::builder()
///     .connection_params(serde_json::json!({"token": "abc"}))?
///     .build(connection)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    connection_params: Option<Value>,
    keep_alive: KeepAliveSettings,
}

impl Client {
    /// Same as `ClientBuilder::new()`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl ClientBuilder {
    /// A builder with no connection params and keep alive turned off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the payload of `connection_init`.
    pub fn connection_params(mut self, params: impl Serialize) -> Result<Self, Error> {
        self.connection_params = Some(
            serde_json::to_value(params).map_err(|error| Error::Serializing(error.to_string()))?,
        );
        Ok(self)
    }

    /// Pings the server whenever the connection has been quiet for
    /// `interval`, and closes it once `retries` pings in a row go
    /// unanswered.
    pub fn keep_alive(mut self, interval: Duration, retries: usize) -> Self {
        self.keep_alive = KeepAliveSettings {
            interval: Some(interval),
            retries,
        };
        self
    }

    /// Runs the handshake over `connection`.
    ///
    /// The returned [`ConnectionActor`] drives the connection from then on and
    /// must be polled somewhere, usually by spawning it.
    pub async fn build<Conn>(self, connection: Conn) -> Result<(Client, ConnectionActor), Error>
    where
        Conn: Connection + Send + 'static,
    {
        let mut connection: Box<dyn ObjectSafeConnection> = Box::new(connection);

        connection
            .send(Message::init(self.connection_params)?)
            .await?;
        wait_for_ack(connection.as_mut()).await?;

        let (commands, command_receiver) = async_channel::unbounded();
        let (drops, drop_receiver) = async_channel::unbounded();

        let actor =
            ConnectionActor::new(connection, command_receiver, drop_receiver, self.keep_alive);

        Ok((Client::new_internal(commands, drops), actor))
    }
}

/// Reads from a freshly opened connection until the server acknowledges
/// `connection_init`.
///
/// Pings are answered meanwhile.  Anything else closes the connection.
async fn wait_for_ack(connection: &mut dyn ObjectSafeConnection) -> Result<(), Error> {
    loop {
        let message = match connection.receive().await {
            Some(Message::Close { code, reason }) => {
                return Err(Error::Close(
                    code.unwrap_or_default(),
                    reason.unwrap_or_default(),
                ))
            }
            Some(Message::Ping | Message::Pong) => continue,
            Some(message) => message,
            None => return Err(Error::Unknown("connection dropped during handshake".into())),
        };

        match message.deserialize::<Event>()? {
            Event::ConnectionAck { .. } => {
                trace!("connection acknowledged");
                return Ok(());
            }
            Event::Ping { .. } => connection.send(Message::graphql_pong()?).await?,
            Event::Pong { .. } => {}
            event => {
                connection
                    .send(Message::close(Reason::UnexpectedHandshake))
                    .await
                    .ok();
                return Err(Error::Decode(format!(
                    "expected connection_ack, got {}",
                    event.r#type()
                )));
            }
        }
    }
}
