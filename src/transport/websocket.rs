use std::sync::Arc;

use futures::lock::Mutex;
use futures_lite::{future, StreamExt};
use url::Url;

use crate::{
    client::{Client, ClientBuilder},
    graphql::GraphqlParams,
    logging::{debug, trace},
    Error,
};

use super::ResponseStream;

/// A persistent subscription client handle.
///
/// This is what `FetcherBuilder::ws_client` accepts.  The fetcher only ever
/// subscribes through it: opening and closing the underlying connection is
/// up to whoever built the handle.
///
/// [`Client`] implements this, so an already connected client can be shared
/// between a fetcher and other code.
pub trait SubscriptionClient: Send + Sync {
    /// Starts a subscription, returning its results in order.
    fn subscribe(&self, params: GraphqlParams) -> future::Boxed<Result<ResponseStream, Error>>;
}

impl SubscriptionClient for Client {
    fn subscribe(&self, params: GraphqlParams) -> future::Boxed<Result<ResponseStream, Error>> {
        let client = self.clone();
        Box::pin(async move {
            let subscription = Client::subscribe(&client, params).await?;
            Ok::<ResponseStream, Error>(subscription.boxed())
        })
    }
}

/// Opens graphql-transport-ws connections for a subscription url.
///
/// Implementations open a socket to the url, hand it to
/// [`ClientBuilder::build`] and make sure the returned
/// [`crate::ConnectionActor`] is running somewhere.  The builder carries the
/// fetcher's connection params and keep alive settings.
///
/// [`crate::TokioConnector`] is available with the `tungstenite` feature.
pub trait Connector: Send + Sync {
    /// Connects to `url` and runs the handshake described by `builder`.
    fn connect(&self, url: &Url, builder: ClientBuilder) -> future::Boxed<Result<Client, Error>>;
}

/// Subscribes over a connection owned by the fetcher.
///
/// Nothing is opened until the first subscription.  Later subscriptions share
/// that connection, and a new one is opened if it has since shut down.
#[derive(Clone)]
pub(crate) struct UrlTransport {
    url: Url,
    settings: ClientBuilder,
    connector: Arc<dyn Connector>,
    client: Arc<Mutex<Option<Client>>>,
}

impl UrlTransport {
    pub(crate) fn new(
        url: &str,
        settings: ClientBuilder,
        connector: Option<Arc<dyn Connector>>,
    ) -> Result<Self, Error> {
        let parsed =
            Url::parse(url).map_err(|error| Error::Connect(url.to_owned(), error.to_string()))?;

        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::Connect(
                url.to_owned(),
                format!("unsupported scheme {}, expected ws or wss", parsed.scheme()),
            ));
        }

        let Some(connector) = connector else {
            return Err(Error::Connect(
                url.to_owned(),
                "no websocket connector available".into(),
            ));
        };

        Ok(UrlTransport {
            url: parsed,
            settings,
            connector,
            client: Arc::default(),
        })
    }

    pub(crate) async fn subscribe(&self, params: GraphqlParams) -> Result<ResponseStream, Error> {
        let client = self.client().await?;
        SubscriptionClient::subscribe(&client, params).await
    }

    async fn client(&self) -> Result<Client, Error> {
        let mut current = self.client.lock().await;

        if let Some(client) = current.as_ref().filter(|client| !client.is_closed()) {
            trace!("reusing connection to {}", self.url);
            return Ok(client.clone());
        }

        debug!("connecting to {}", self.url);
        let client = self
            .connector
            .connect(&self.url, self.settings.clone())
            .await?;
        *current = Some(client.clone());

        Ok(client)
    }
}
